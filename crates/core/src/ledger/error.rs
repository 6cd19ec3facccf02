//! Ledger error types.
//!
//! Every failure a ledger operation can raise, grouped by the request/response
//! kind it maps to. [`LedgerError::kind`] performs that mapping; storage detail
//! never leaves this crate in the message text.

use ledgerdesk_shared::AppError;
use ledgerdesk_shared::types::{UserId, WithdrawalId, format_usd};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::store::StoreError;
use crate::workflow::error::WorkflowError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Authorization Errors ==========
    /// No caller identity was supplied.
    #[error("Admin UID is missing.")]
    MissingCaller,

    /// The caller has no account or is not an administrator.
    #[error("Only administrators can perform this action.")]
    NotAdmin,

    // ========== Validation Errors ==========
    /// Input failed validation before any write.
    #[error("{0}")]
    InvalidArgument(String),

    /// The accrual rate is not positive or is finer than the stored precision.
    #[error("Accrual rate must be positive with at most 6 decimal places, got {0}")]
    InvalidRate(Decimal),

    // ========== Lookup Errors ==========
    /// Target account does not exist.
    #[error("User {0} not found.")]
    AccountNotFound(UserId),

    // ========== Precondition Errors ==========
    /// Withdrawal is missing or no longer pending.
    #[error("Withdrawal not found or already processed.")]
    WithdrawalNotPending(WithdrawalId),

    /// The account behind a withdrawal no longer exists.
    #[error("User associated with withdrawal not found.")]
    WithdrawalAccountMissing(UserId),

    /// The caller's view of the withdrawal disagrees with the stored request.
    #[error("Withdrawal {0} does not match the supplied user or amount.")]
    WithdrawalMismatch(WithdrawalId),

    /// Balance read inside the unit is below the withdrawal amount.
    #[error("Insufficient funds. User's balance has changed.")]
    InsufficientFunds {
        /// Balance at the time of the check.
        balance: Decimal,
        /// Requested amount.
        amount: Decimal,
    },

    /// The credit would take the balance past what an account can hold.
    #[error("Deposit would exceed the maximum balance for user {0}.")]
    BalanceLimit(UserId),

    /// Workflow rejected the transition.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    // ========== Internal Errors ==========
    /// Optimistic retries were exhausted.
    #[error("Ledger is busy, please retry.")]
    ConcurrentModification {
        /// Commit attempts made.
        attempts: u32,
    },

    /// Storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An accrual run stopped part way. Accounts already committed keep their
    /// accrual; a re-run for the same date picks up the rest.
    #[error("ROI run stopped after {processed} users. Re-run to finish.")]
    AccrualIncomplete {
        /// Accounts committed before the failure.
        processed: usize,
        /// What stopped the run.
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    /// Builds an `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Maps this error to its request/response kind.
    #[must_use]
    pub fn kind(&self) -> AppError {
        let message = self.to_string();
        match self {
            Self::MissingCaller => AppError::Unauthenticated(message),
            Self::NotAdmin => AppError::PermissionDenied(message),
            Self::InvalidArgument(_) => AppError::InvalidArgument(message),
            Self::AccountNotFound(_) => AppError::NotFound(message),
            Self::WithdrawalNotPending(_)
            | Self::WithdrawalAccountMissing(_)
            | Self::WithdrawalMismatch(_)
            | Self::InsufficientFunds { .. }
            | Self::BalanceLimit(_) => AppError::FailedPrecondition(message),
            // A lost race on the state machine is the same precondition failure.
            Self::Workflow(_) => AppError::FailedPrecondition(
                "Withdrawal not found or already processed.".to_string(),
            ),
            Self::InvalidRate(_)
            | Self::ConcurrentModification { .. }
            | Self::AccrualIncomplete { .. } => AppError::Internal(message),
            Self::Store(_) => AppError::Internal("An internal error occurred.".to_string()),
        }
    }

    /// Returns true if the failure is on the server side.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self.kind(), AppError::Internal(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        err.kind()
    }
}

/// Formats the insufficient-funds detail for logs.
#[must_use]
pub fn describe_shortfall(balance: Decimal, amount: Decimal) -> String {
    format!(
        "balance {} is below requested {}",
        format_usd(balance),
        format_usd(amount)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::WithdrawalStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_authorization_kinds() {
        assert_eq!(LedgerError::MissingCaller.kind().status_code(), 401);
        assert_eq!(
            LedgerError::NotAdmin.kind(),
            AppError::PermissionDenied("Only administrators can perform this action.".into())
        );
    }

    #[test]
    fn test_precondition_kinds() {
        let wid = WithdrawalId::parse("w1").unwrap();
        for err in [
            LedgerError::WithdrawalNotPending(wid.clone()),
            LedgerError::WithdrawalMismatch(wid),
            LedgerError::BalanceLimit(UserId::parse("u1").unwrap()),
            LedgerError::InsufficientFunds {
                balance: dec!(1),
                amount: dec!(2),
            },
            LedgerError::Workflow(WorkflowError::InvalidTransition {
                from: WithdrawalStatus::Approved,
                to: WithdrawalStatus::Rejected,
            }),
        ] {
            assert_eq!(err.kind().error_code(), "failed-precondition");
        }
    }

    #[test]
    fn test_store_detail_is_hidden() {
        let err = LedgerError::Store(StoreError::Backend("password=hunter2".into()));
        let kind = err.kind();
        assert_eq!(kind.status_code(), 500);
        assert!(!kind.message().contains("hunter2"));
        assert!(err.is_internal());
    }

    #[test]
    fn test_incomplete_accrual_reports_count_only() {
        let err = LedgerError::AccrualIncomplete {
            processed: 12,
            source: Box::new(LedgerError::Store(StoreError::Backend("socket closed".into()))),
        };
        assert_eq!(
            err.kind(),
            AppError::Internal("ROI run stopped after 12 users. Re-run to finish.".into())
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = LedgerError::AccountNotFound(UserId::parse("u9").unwrap());
        assert_eq!(err.kind(), AppError::NotFound("User u9 not found.".into()));
    }

    #[test]
    fn test_shortfall_description() {
        assert_eq!(
            describe_shortfall(dec!(5), dec!(7.5)),
            "balance $5.00 is below requested $7.50"
        );
    }
}
