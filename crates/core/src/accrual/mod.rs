//! Daily interest accrual.

pub mod calc;
pub mod job;


pub use calc::{AccrualPlan, compute_accrual, plan_accrual};
pub use job::{AccrualJob, AccrualReport};
