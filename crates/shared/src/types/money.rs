//! Monetary helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Balances and amounts are `rust_decimal::Decimal`, kept in whole cents.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places every committed amount is rounded to.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a balance column holds: `NUMERIC(20, 2)`, i.e. 999,999,999,999,999,999.99.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0x630F_FFFF, 0x6BC7_5E2D, 0x5, false, MONEY_SCALE);

/// Rounds an amount to whole cents using Banker's Rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Returns true if the amount carries precision below one cent.
#[must_use]
pub fn has_fractional_cents(amount: Decimal) -> bool {
    amount.normalize().scale() > MONEY_SCALE
}

/// Adds two amounts, returning `None` past [`MAX_MONEY`] or on `Decimal` overflow.
#[must_use]
pub fn checked_money_add(a: Decimal, b: Decimal) -> Option<Decimal> {
    a.checked_add(b).filter(|sum| sum.abs() <= MAX_MONEY)
}

/// Formats an amount as dollars with exactly two decimal places, e.g. `$1500.00`.
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    let mut rounded = round_money(amount);
    rounded.rescale(MONEY_SCALE);
    format!("${rounded}")
}
