//! Monetary amounts in minor units
//!
//! Every balance, price and discount in the engine is an integer number of
//! minor currency units (cents). Signed values appear only on ledger rows,
//! where a negative amount records a debit or a revocation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount in minor units (e.g. cents)
///
/// Positive for balances and prices; ledger transaction rows use the sign
/// to distinguish credits from debits.
pub type Amount = i64;

/// Compute `percent` of `base`, rounded half-up to the nearest minor unit
///
/// Half-up (`MidpointAwayFromZero`) is the crate-wide rounding mode for
/// percentage discounts; see DESIGN.md. The multiplication runs through
/// `Decimal` so intermediate products cannot overflow `i64`.
///
/// # Arguments
///
/// * `base` - The amount the percentage applies to, in minor units
/// * `percent` - Whole percentage points (10 means 10%)
///
/// # Returns
///
/// The rounded share of `base`, or `None` if the result does not fit in an
/// `Amount` (only reachable with absurd inputs).
pub fn percent_half_up(base: Amount, percent: i64) -> Option<Amount> {
    let exact = Decimal::from(base) * Decimal::from(percent) / Decimal::from(100);
    exact
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::ten_percent_of_100_eur(10_000, 10, 1_000)]
    #[case::zero_base(0, 50, 0)]
    #[case::zero_percent(10_000, 0, 0)]
    #[case::rounds_half_up(125, 10, 13)] // 12.5 -> 13
    #[case::rounds_down_below_half(124, 10, 12)] // 12.4 -> 12
    #[case::full_percent(9_999, 100, 9_999)]
    #[case::odd_cents(333, 33, 110)] // 109.89 -> 110
    fn test_percent_half_up(#[case] base: Amount, #[case] pct: i64, #[case] expected: Amount) {
        assert_eq!(percent_half_up(base, pct), Some(expected));
    }
}
