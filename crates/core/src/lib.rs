//! Ledger core for Ledgerdesk.
//!
//! This crate contains the balance-mutating business logic with ZERO web or
//! database dependencies. Storage is reached through the [`store::LedgerStore`]
//! trait so the backend is swappable.
//!
//! # Modules
//!
//! - `ledger` - Accounts, transaction records, authorization gate, ledger operations
//! - `workflow` - Withdrawal request state machine
//! - `accrual` - Scheduled interest (ROI) accrual batch
//! - `notification` - Post-commit notification delivery
//! - `store` - Storage seam and the in-process backend

pub mod accrual;
pub mod ledger;
pub mod notification;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod testing;
