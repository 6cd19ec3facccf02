//! Workflow error types for withdrawal lifecycle management.

use thiserror::Error;

use crate::workflow::types::WithdrawalStatus;

/// Errors that can occur during workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: WithdrawalStatus,
        /// The attempted target status.
        to: WithdrawalStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_error() {
        let err = WorkflowError::InvalidTransition {
            from: WithdrawalStatus::Approved,
            to: WithdrawalStatus::Rejected,
        };
        assert!(err.to_string().contains("approved"));
        assert!(err.to_string().contains("rejected"));
    }
}
