//! Withdrawal request workflow for Ledgerdesk.
//!
//! This module implements the withdrawal lifecycle state machine:
//! `pending` moves exactly once to `approved` or `rejected`, and both are terminal.
//!
//! # Modules
//!
//! - `types` - Withdrawal request, status, and workflow actions
//! - `error` - Workflow-specific error types
//! - `service` - State transition logic

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::WorkflowError;
pub use service::WithdrawalWorkflow;
pub use types::{WithdrawalAction, WithdrawalRequest, WithdrawalStatus};
