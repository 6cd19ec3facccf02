//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{
    MAX_MONEY, MONEY_SCALE, checked_money_add, format_usd, has_fractional_cents, round_money,
};
