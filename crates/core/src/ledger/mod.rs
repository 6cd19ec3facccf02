//! Balance-mutation ledger.
//!
//! This module implements the ledger core:
//! - Account and transaction record types
//! - The admin authorization gate
//! - Deposits and withdrawal decisions with optimistic retry
//! - Audit replay of an account's history
//! - Error types for ledger operations

pub mod auth;
pub mod error;
pub mod reconcile;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use auth::{AdminIdentity, authorize_admin};
pub use error::LedgerError;
pub use reconcile::{Reconciliation, replay};
pub use service::{
    ApproveWithdrawalInput, DepositInput, DepositReceipt, LedgerService, Overview,
    RejectWithdrawalInput, WithdrawalReceipt,
};
pub use types::{Account, LedgerRecord, TransactionKind};
