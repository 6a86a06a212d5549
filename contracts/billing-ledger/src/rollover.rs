//! Lazy period advance.
//!
//! Nothing moves an account's billing period on a timer. Every operation that
//! depends on period or active state calls [`advance`] first, and each call
//! crosses at most one period boundary, even when several `period_length`
//! intervals have gone by since the anchor.

use crate::{Error, Subscription};
use soroban_sdk::contracttype;

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Still inside the current period; nothing changed.
    Pending,
    /// Boundary crossed, one fee debited from the reserve.
    Renewed,
    /// Boundary crossed with less than one fee in reserve.
    Lapsed,
}

/// Process the next period boundary for `sub` if `now` has reached it.
///
/// On `Renewed` the caller owes `fee_per_period` to undistributed revenue
/// (it must come off `total_reserved` too). On `Lapsed` the reserve is left
/// untouched and the subscription goes inactive.
pub fn advance(
    sub: &mut Subscription,
    reserve: &mut i128,
    fee_per_period: i128,
    period_length: u64,
    now: u64,
) -> Result<Outcome, Error> {
    let next_anchor = sub
        .period_anchor
        .checked_add(period_length)
        .ok_or(Error::Overflow)?;
    if now < next_anchor {
        return Ok(Outcome::Pending);
    }

    sub.period_count = sub.period_count.checked_add(1).ok_or(Error::Overflow)?;
    sub.period_anchor = next_anchor;

    if *reserve < fee_per_period {
        sub.active = false;
        return Ok(Outcome::Lapsed);
    }

    sub.active = true;
    // reserve >= fee_per_period here
    *reserve -= fee_per_period;
    Ok(Outcome::Renewed)
}
