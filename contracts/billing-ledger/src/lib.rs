//! Reserve Billing - Billing Ledger (Soroban)
//! Fixed-fee recurring billing paid out of a prepaid per-account reserve.
//! Periods advance lazily: an account is only billed when it is touched.

#![no_std]
use reserve_billing_admin::AdminError;
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
};

mod rollover;
mod storage;

pub use rollover::Outcome;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    /// Zero or negative fee, or zero period length.
    InvalidConfig = 3,
    /// Zero periods requested.
    InvalidAmount = 4,
    /// Caller's token balance cannot cover the payment.
    InsufficientFunds = 10,
    AlreadySubscribed = 11,
    NoSubscription = 12,
    /// Nothing eligible to withdraw.
    EmptyReserve = 13,
    /// Withdrawal exceeds the caller's reserve.
    InsufficientReserve = 14,
    Unauthorized = 20,
    NoPendingAdmin = 21,
    Overflow = 30,
}

impl From<AdminError> for Error {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::NotInitialized => Error::NotInitialized,
            AdminError::Unauthorized => Error::Unauthorized,
            AdminError::NoPendingAdmin => Error::NoPendingAdmin,
        }
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subscription {
    /// Periods paid and entered, 1 on subscribe.
    pub period_count: u32,
    /// Start of the current period.
    pub period_anchor: u64,
    pub active: bool,
}

/// Fixed at initialization.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedgerConfig {
    pub token: Address,
    pub fee_per_period: i128,
    pub period_length: u64,
}

/// Running aggregates. `total_reserved` is always the exact sum of every
/// account reserve; `subscriber_count` is the number of active records.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LedgerTotals {
    pub total_reserved: i128,
    pub subscriber_count: u32,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    PendingAdmin,
    Config,
    Totals,
    Subscription(Address),
    Reserve(Address),
}

#[contract]
pub struct BillingLedgerContract;

#[contractimpl]
impl BillingLedgerContract {
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        fee_per_period: i128,
        period_length: u64,
    ) -> Result<(), Error> {
        storage::bump_instance(&env);
        if storage::is_initialized(&env) {
            return Err(Error::AlreadyInitialized);
        }
        admin.require_auth();
        if fee_per_period <= 0 || period_length == 0 {
            return Err(Error::InvalidConfig);
        }

        env.storage().instance().set(&DataKey::Admin, &admin);
        storage::set_config(
            &env,
            &LedgerConfig {
                token,
                fee_per_period,
                period_length,
            },
        );
        storage::set_totals(&env, &LedgerTotals::default());

        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("init")),
            (admin, fee_per_period, period_length),
        );
        Ok(())
    }

    /// Pay for `period_amount` periods up front: the current one is consumed,
    /// the rest goes to the subscriber's reserve.
    pub fn subscribe(env: Env, subscriber: Address, period_amount: u32) -> Result<(), Error> {
        storage::bump_instance(&env);
        subscriber.require_auth();
        let config = storage::config(&env)?;

        if period_amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if matches!(storage::subscription(&env, &subscriber), Some(sub) if sub.active) {
            return Err(Error::AlreadySubscribed);
        }

        let cost = fee_units(&config, period_amount)?;
        Self::_pull(&env, &config, &subscriber, cost)?;

        let prepaid = cost - config.fee_per_period;
        let reserve = storage::reserve(&env, &subscriber)
            .checked_add(prepaid)
            .ok_or(Error::Overflow)?;
        let mut totals = storage::totals(&env);
        totals.total_reserved = totals
            .total_reserved
            .checked_add(prepaid)
            .ok_or(Error::Overflow)?;
        totals.subscriber_count = totals
            .subscriber_count
            .checked_add(1)
            .ok_or(Error::Overflow)?;

        let sub = Subscription {
            period_count: 1,
            period_anchor: env.ledger().timestamp(),
            active: true,
        };
        storage::set_subscription(&env, &subscriber, &sub);
        storage::set_reserve(&env, &subscriber, reserve);
        storage::set_totals(&env, &totals);

        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("subbed")),
            (subscriber, period_amount, reserve),
        );
        Ok(())
    }

    /// End the subscription and refund the whole reserve. Returns the refund.
    pub fn unsubscribe(env: Env, subscriber: Address) -> Result<i128, Error> {
        storage::bump_instance(&env);
        subscriber.require_auth();
        let config = storage::config(&env)?;
        let mut sub = Self::_active_subscription(&env, &subscriber)?;

        let mut totals = storage::totals(&env);
        let (_, refund) = Self::_settle(&env, &config, &mut totals, &subscriber, &mut sub)?;

        // a lapse during settlement already took this account off the count
        if sub.active {
            totals.subscriber_count = totals
                .subscriber_count
                .checked_sub(1)
                .ok_or(Error::Overflow)?;
        }
        totals.total_reserved = totals
            .total_reserved
            .checked_sub(refund)
            .ok_or(Error::Overflow)?;

        storage::remove_subscription(&env, &subscriber);
        storage::set_reserve(&env, &subscriber, 0);
        storage::set_totals(&env, &totals);

        if refund > 0 {
            Self::_push(&env, &config, &subscriber, refund);
        }

        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("unsubbed")),
            (subscriber, refund),
        );
        Ok(refund)
    }

    /// Top up the reserve by `amount` periods.
    pub fn deposit(env: Env, subscriber: Address, amount: u32) -> Result<(), Error> {
        storage::bump_instance(&env);
        subscriber.require_auth();
        let config = storage::config(&env)?;

        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        let mut sub = Self::_active_subscription(&env, &subscriber)?;
        let value = fee_units(&config, amount)?;

        let mut totals = storage::totals(&env);
        let (_, reserve) = Self::_settle(&env, &config, &mut totals, &subscriber, &mut sub)?;
        Self::_pull(&env, &config, &subscriber, value)?;

        let reserve = reserve.checked_add(value).ok_or(Error::Overflow)?;
        totals.total_reserved = totals
            .total_reserved
            .checked_add(value)
            .ok_or(Error::Overflow)?;

        storage::set_subscription(&env, &subscriber, &sub);
        storage::set_reserve(&env, &subscriber, reserve);
        storage::set_totals(&env, &totals);

        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("deposit")),
            (subscriber, value, reserve),
        );
        Ok(())
    }

    /// Take `amount` periods' worth back out of the reserve. Returns the
    /// amount transferred.
    pub fn withdraw(env: Env, subscriber: Address, amount: u32) -> Result<i128, Error> {
        storage::bump_instance(&env);
        subscriber.require_auth();
        let config = storage::config(&env)?;

        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        let mut sub = Self::_active_subscription(&env, &subscriber)?;

        let mut totals = storage::totals(&env);
        let (_, reserve) = Self::_settle(&env, &config, &mut totals, &subscriber, &mut sub)?;

        if reserve == 0 {
            return Err(Error::EmptyReserve);
        }
        let value = fee_units(&config, amount)?;
        if value > reserve {
            return Err(Error::InsufficientReserve);
        }

        let reserve = reserve - value;
        totals.total_reserved = totals
            .total_reserved
            .checked_sub(value)
            .ok_or(Error::Overflow)?;

        storage::set_subscription(&env, &subscriber, &sub);
        storage::set_reserve(&env, &subscriber, reserve);
        storage::set_totals(&env, &totals);

        Self::_push(&env, &config, &subscriber, value);

        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("withdraw")),
            (subscriber, value, reserve),
        );
        Ok(value)
    }

    /// Advance `account` across its next period boundary if one is due.
    /// Anyone may call this.
    pub fn rollover(env: Env, account: Address) -> Result<Outcome, Error> {
        storage::bump_instance(&env);
        let config = storage::config(&env)?;
        let mut sub = storage::subscription(&env, &account).ok_or(Error::NoSubscription)?;

        let mut totals = storage::totals(&env);
        let (outcome, reserve) = Self::_settle(&env, &config, &mut totals, &account, &mut sub)?;
        if outcome != Outcome::Pending {
            storage::set_subscription(&env, &account, &sub);
            storage::set_reserve(&env, &account, reserve);
            storage::set_totals(&env, &totals);
        }
        Ok(outcome)
    }

    /// Operator collects undistributed revenue: everything the ledger holds
    /// beyond the reserves it owes. Returns the amount transferred.
    pub fn withdraw_fees(env: Env, operator: Address) -> Result<i128, Error> {
        storage::bump_instance(&env);
        reserve_billing_admin::require_admin(&env, &DataKey::Admin, &operator)?;
        let config = storage::config(&env)?;

        let held = token::Client::new(&env, &config.token).balance(&env.current_contract_address());
        let reserved = storage::totals(&env).total_reserved;
        let available = held.checked_sub(reserved).ok_or(Error::Overflow)?;
        if held == 0 || available <= 0 {
            return Err(Error::EmptyReserve);
        }

        Self::_push(&env, &config, &operator, available);

        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("fees")),
            (operator, available),
        );
        Ok(available)
    }

    pub fn propose_admin(
        env: Env,
        current_admin: Address,
        new_admin: Address,
    ) -> Result<(), Error> {
        storage::bump_instance(&env);
        reserve_billing_admin::propose_admin(
            &env,
            &DataKey::Admin,
            &DataKey::PendingAdmin,
            current_admin,
            new_admin,
        )?;
        Ok(())
    }

    pub fn accept_admin(env: Env, new_admin: Address) -> Result<(), Error> {
        storage::bump_instance(&env);
        reserve_billing_admin::accept_admin(
            &env,
            &DataKey::Admin,
            &DataKey::PendingAdmin,
            new_admin.clone(),
        )?;
        env.events().publish(
            (symbol_short!("ledger"), symbol_short!("admin")),
            new_admin,
        );
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────────
    //
    // Reads report records as last written and never run a rollover, so
    // `active` and `period_count` may lag until the account is next touched.

    pub fn get_subscription(env: Env, account: Address) -> Option<Subscription> {
        storage::bump_instance(&env);
        storage::subscription(&env, &account)
    }

    pub fn is_subscribed(env: Env, account: Address) -> bool {
        storage::bump_instance(&env);
        storage::subscription(&env, &account).map_or(false, |sub| sub.active)
    }

    pub fn reserve_amount(env: Env, account: Address) -> i128 {
        storage::bump_instance(&env);
        storage::reserve(&env, &account)
    }

    pub fn total_reserved(env: Env) -> i128 {
        storage::bump_instance(&env);
        storage::totals(&env).total_reserved
    }

    pub fn subscriber_count(env: Env) -> u32 {
        storage::bump_instance(&env);
        storage::totals(&env).subscriber_count
    }

    pub fn get_config(env: Env) -> Result<LedgerConfig, Error> {
        storage::bump_instance(&env);
        storage::config(&env)
    }

    pub fn get_admin(env: Env) -> Result<Address, Error> {
        storage::bump_instance(&env);
        Ok(reserve_billing_admin::stored_admin(&env, &DataKey::Admin)?)
    }

    /// What `withdraw_fees` would pay out right now.
    pub fn available_fees(env: Env) -> Result<i128, Error> {
        storage::bump_instance(&env);
        let config = storage::config(&env)?;
        let held = token::Client::new(&env, &config.token).balance(&env.current_contract_address());
        let available = held
            .checked_sub(storage::totals(&env).total_reserved)
            .ok_or(Error::Overflow)?;
        Ok(available.max(0))
    }

    /// Timestamp at which the account's next boundary becomes due.
    pub fn next_rollover_at(env: Env, account: Address) -> Result<Option<u64>, Error> {
        storage::bump_instance(&env);
        let config = storage::config(&env)?;
        match storage::subscription(&env, &account) {
            Some(sub) => Ok(Some(
                sub.period_anchor
                    .checked_add(config.period_length)
                    .ok_or(Error::Overflow)?,
            )),
            None => Ok(None),
        }
    }

    fn _active_subscription(env: &Env, account: &Address) -> Result<Subscription, Error> {
        match storage::subscription(env, account) {
            Some(sub) if sub.active => Ok(sub),
            _ => Err(Error::NoSubscription),
        }
    }

    /// Run the rollover for `account` and fold the result into `totals`.
    /// Returns the outcome and the account's reserve after it. Nothing is
    /// written; the caller persists `sub`, the reserve and `totals`.
    fn _settle(
        env: &Env,
        config: &LedgerConfig,
        totals: &mut LedgerTotals,
        account: &Address,
        sub: &mut Subscription,
    ) -> Result<(Outcome, i128), Error> {
        let was_active = sub.active;
        let mut reserve = storage::reserve(env, account);
        let outcome = rollover::advance(
            sub,
            &mut reserve,
            config.fee_per_period,
            config.period_length,
            env.ledger().timestamp(),
        )?;

        match outcome {
            Outcome::Pending => {}
            Outcome::Renewed => {
                totals.total_reserved = totals
                    .total_reserved
                    .checked_sub(config.fee_per_period)
                    .ok_or(Error::Overflow)?;
                if !was_active {
                    totals.subscriber_count = totals
                        .subscriber_count
                        .checked_add(1)
                        .ok_or(Error::Overflow)?;
                }
                env.events().publish(
                    (symbol_short!("ledger"), symbol_short!("renewed")),
                    (account.clone(), sub.period_count, reserve),
                );
            }
            Outcome::Lapsed => {
                if was_active {
                    totals.subscriber_count = totals
                        .subscriber_count
                        .checked_sub(1)
                        .ok_or(Error::Overflow)?;
                }
                log!(env, "subscription lapsed", account.clone(), reserve);
                env.events().publish(
                    (symbol_short!("ledger"), symbol_short!("lapsed")),
                    (account.clone(), sub.period_count, reserve),
                );
            }
        }
        Ok((outcome, reserve))
    }

    fn _pull(env: &Env, config: &LedgerConfig, from: &Address, amount: i128) -> Result<(), Error> {
        let token_client = token::Client::new(env, &config.token);
        if token_client.balance(from) < amount {
            return Err(Error::InsufficientFunds);
        }
        token_client.transfer(from, &env.current_contract_address(), &amount);
        Ok(())
    }

    fn _push(env: &Env, config: &LedgerConfig, to: &Address, amount: i128) {
        let token_client = token::Client::new(env, &config.token);
        token_client.transfer(&env.current_contract_address(), to, &amount);
    }
}

fn fee_units(config: &LedgerConfig, periods: u32) -> Result<i128, Error> {
    config
        .fee_per_period
        .checked_mul(i128::from(periods))
        .ok_or(Error::Overflow)
}
