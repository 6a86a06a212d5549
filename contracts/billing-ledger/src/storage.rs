//! Typed access to ledger storage.
//!
//! Config, totals and the admin keys live in instance storage. Per-account
//! records live in persistent storage and get their TTL bumped on every write.

use crate::{DataKey, Error, LedgerConfig, LedgerTotals, Subscription};
use soroban_sdk::{Address, Env};

const INSTANCE_LIFETIME_THRESHOLD: u32 = 17_280;
const INSTANCE_BUMP_AMOUNT: u32 = 86_400;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 120_960;
const PERSISTENT_BUMP_AMOUNT: u32 = 1_051_200;

pub fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

pub fn is_initialized(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Config)
}

pub fn config(env: &Env) -> Result<LedgerConfig, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(Error::NotInitialized)
}

pub fn set_config(env: &Env, config: &LedgerConfig) {
    env.storage().instance().set(&DataKey::Config, config);
}

pub fn totals(env: &Env) -> LedgerTotals {
    env.storage()
        .instance()
        .get(&DataKey::Totals)
        .unwrap_or_default()
}

pub fn set_totals(env: &Env, totals: &LedgerTotals) {
    env.storage().instance().set(&DataKey::Totals, totals);
}

pub fn subscription(env: &Env, account: &Address) -> Option<Subscription> {
    env.storage()
        .persistent()
        .get(&DataKey::Subscription(account.clone()))
}

pub fn set_subscription(env: &Env, account: &Address, sub: &Subscription) {
    let _ttl_key = DataKey::Subscription(account.clone());
    env.storage().persistent().set(&_ttl_key, sub);
    env.storage().persistent().extend_ttl(
        &_ttl_key,
        PERSISTENT_LIFETIME_THRESHOLD,
        PERSISTENT_BUMP_AMOUNT,
    );
}

pub fn remove_subscription(env: &Env, account: &Address) {
    env.storage()
        .persistent()
        .remove(&DataKey::Subscription(account.clone()));
}

pub fn reserve(env: &Env, account: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Reserve(account.clone()))
        .unwrap_or(0)
}

/// A zero reserve is stored as an absent key.
pub fn set_reserve(env: &Env, account: &Address, amount: i128) {
    let _ttl_key = DataKey::Reserve(account.clone());
    if amount == 0 {
        env.storage().persistent().remove(&_ttl_key);
        return;
    }
    env.storage().persistent().set(&_ttl_key, &amount);
    env.storage().persistent().extend_ttl(
        &_ttl_key,
        PERSISTENT_LIFETIME_THRESHOLD,
        PERSISTENT_BUMP_AMOUNT,
    );
}
