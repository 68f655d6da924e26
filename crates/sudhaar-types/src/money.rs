//! Monetary amounts are stored as integer cents and exposed as two-place decimals.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Largest storable amount: 12 significant digits, two of them after the point.
pub const MAX_CENTS: i64 = 999_999_999_999;

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Converts an amount to cents. Returns `None` for more than two decimal
/// places or a value outside the storable range.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    if amount.round_dp(2) != amount {
        return None;
    }
    let cents = (amount * Decimal::ONE_HUNDRED).trunc().to_i64()?;
    if cents.abs() > MAX_CENTS {
        return None;
    }
    Some(cents)
}
