//! Reserve Billing - Admin access control.
//! A single privileged principal per contract, rotated in two steps
//! (propose, then accept). The host contract owns the storage keys.

#![no_std]
use soroban_sdk::{contracterror, Address, Env, IntoVal, TryFromVal, Val};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum AdminError {
    NotInitialized = 1,
    Unauthorized = 2,
    NoPendingAdmin = 3,
}

pub fn stored_admin<K>(env: &Env, admin_key: &K) -> Result<Address, AdminError>
where
    K: IntoVal<Env, Val> + TryFromVal<Env, Val> + Clone,
{
    env.storage()
        .instance()
        .get(admin_key)
        .ok_or(AdminError::NotInitialized)
}

/// Requires `caller` to have signed the invocation and to be the stored admin.
pub fn require_admin<K>(env: &Env, admin_key: &K, caller: &Address) -> Result<(), AdminError>
where
    K: IntoVal<Env, Val> + TryFromVal<Env, Val> + Clone,
{
    caller.require_auth();
    let stored = stored_admin(env, admin_key)?;
    if *caller != stored {
        return Err(AdminError::Unauthorized);
    }
    Ok(())
}

pub fn propose_admin<K>(
    env: &Env,
    admin_key: &K,
    pending_key: &K,
    current_admin: Address,
    new_admin: Address,
) -> Result<(), AdminError>
where
    K: IntoVal<Env, Val> + TryFromVal<Env, Val> + Clone,
{
    require_admin(env, admin_key, &current_admin)?;
    env.storage().instance().set(pending_key, &new_admin);
    Ok(())
}

pub fn accept_admin<K>(
    env: &Env,
    admin_key: &K,
    pending_key: &K,
    new_admin: Address,
) -> Result<(), AdminError>
where
    K: IntoVal<Env, Val> + TryFromVal<Env, Val> + Clone,
{
    new_admin.require_auth();
    let pending: Address = env
        .storage()
        .instance()
        .get(pending_key)
        .ok_or(AdminError::NoPendingAdmin)?;
    if new_admin != pending {
        return Err(AdminError::Unauthorized);
    }
    env.storage().instance().set(admin_key, &new_admin);
    env.storage().instance().remove(pending_key);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{contract, contractimpl, contracttype, testutils::Address as _};

    #[contracttype]
    #[derive(Clone)]
    pub enum Key {
        Admin,
        Pending,
    }

    #[contract]
    pub struct Host;

    #[contractimpl]
    impl Host {}

    fn setup(env: &Env) -> (Address, Address) {
        let id = env.register(Host, ());
        let admin = Address::generate(env);
        env.as_contract(&id, || {
            env.storage().instance().set(&Key::Admin, &admin);
        });
        (id, admin)
    }

    #[test]
    fn test_require_admin_accepts_stored_admin() {
        let env = Env::default();
        env.mock_all_auths();
        let (id, admin) = setup(&env);
        env.as_contract(&id, || {
            assert_eq!(require_admin(&env, &Key::Admin, &admin), Ok(()));
        });
    }

    #[test]
    fn test_require_admin_rejects_stranger() {
        let env = Env::default();
        env.mock_all_auths();
        let (id, _) = setup(&env);
        let stranger = Address::generate(&env);
        env.as_contract(&id, || {
            assert_eq!(
                require_admin(&env, &Key::Admin, &stranger),
                Err(AdminError::Unauthorized)
            );
        });
    }

    #[test]
    fn test_missing_admin_is_not_initialized() {
        let env = Env::default();
        env.mock_all_auths();
        let id = env.register(Host, ());
        env.as_contract(&id, || {
            assert_eq!(
                stored_admin(&env, &Key::Admin),
                Err(AdminError::NotInitialized)
            );
        });
    }

    #[test]
    fn test_two_step_rotation() {
        let env = Env::default();
        env.mock_all_auths();
        let (id, admin) = setup(&env);
        let next = Address::generate(&env);
        env.as_contract(&id, || {
            propose_admin(&env, &Key::Admin, &Key::Pending, admin.clone(), next.clone()).unwrap();
            // proposal alone changes nothing
            assert_eq!(stored_admin(&env, &Key::Admin), Ok(admin.clone()));

            accept_admin(&env, &Key::Admin, &Key::Pending, next.clone()).unwrap();
            assert_eq!(stored_admin(&env, &Key::Admin), Ok(next.clone()));
            assert!(!env.storage().instance().has(&Key::Pending));
        });
    }

    #[test]
    fn test_accept_by_wrong_address_fails() {
        let env = Env::default();
        env.mock_all_auths();
        let (id, admin) = setup(&env);
        let next = Address::generate(&env);
        let other = Address::generate(&env);
        env.as_contract(&id, || {
            propose_admin(&env, &Key::Admin, &Key::Pending, admin.clone(), next).unwrap();
            assert_eq!(
                accept_admin(&env, &Key::Admin, &Key::Pending, other),
                Err(AdminError::Unauthorized)
            );
        });
    }

    #[test]
    fn test_accept_without_proposal_fails() {
        let env = Env::default();
        env.mock_all_auths();
        let (id, _) = setup(&env);
        let next = Address::generate(&env);
        env.as_contract(&id, || {
            assert_eq!(
                accept_admin(&env, &Key::Admin, &Key::Pending, next),
                Err(AdminError::NoPendingAdmin)
            );
        });
    }

    #[test]
    fn test_propose_by_non_admin_fails() {
        let env = Env::default();
        env.mock_all_auths();
        let (id, _) = setup(&env);
        let stranger = Address::generate(&env);
        let next = Address::generate(&env);
        env.as_contract(&id, || {
            assert_eq!(
                propose_admin(&env, &Key::Admin, &Key::Pending, stranger, next),
                Err(AdminError::Unauthorized)
            );
        });
    }
}
