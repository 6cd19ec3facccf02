//! Workflow service for withdrawal state transitions.
//!
//! This module implements the state machine logic only. Whether the transition
//! is actually persisted is decided by the store's conditional commit, so two
//! callers that both pass these checks still cannot both win.

use chrono::Utc;
use ledgerdesk_shared::types::UserId;

use crate::workflow::error::WorkflowError;
use crate::workflow::types::{WithdrawalAction, WithdrawalStatus};

/// Stateless service for managing withdrawal workflow transitions.
pub struct WithdrawalWorkflow;

impl WithdrawalWorkflow {
    /// Approve a pending withdrawal.
    ///
    /// # Returns
    /// * `Ok(WithdrawalAction::Approve)` if the transition is valid
    /// * `Err(WorkflowError::InvalidTransition)` if not in Pending status
    pub fn approve(
        current_status: WithdrawalStatus,
        approved_by: UserId,
    ) -> Result<WithdrawalAction, WorkflowError> {
        match current_status {
            WithdrawalStatus::Pending => Ok(WithdrawalAction::Approve {
                new_status: WithdrawalStatus::Approved,
                approved_by,
                approved_at: Utc::now(),
            }),
            _ => Err(WorkflowError::InvalidTransition {
                from: current_status,
                to: WithdrawalStatus::Approved,
            }),
        }
    }

    /// Reject a pending withdrawal.
    ///
    /// # Returns
    /// * `Ok(WithdrawalAction::Reject)` if the transition is valid
    /// * `Err(WorkflowError::InvalidTransition)` if not in Pending status
    pub fn reject(
        current_status: WithdrawalStatus,
        rejected_by: UserId,
    ) -> Result<WithdrawalAction, WorkflowError> {
        match current_status {
            WithdrawalStatus::Pending => Ok(WithdrawalAction::Reject {
                new_status: WithdrawalStatus::Rejected,
                rejected_by,
                rejected_at: Utc::now(),
            }),
            _ => Err(WorkflowError::InvalidTransition {
                from: current_status,
                to: WithdrawalStatus::Rejected,
            }),
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: WithdrawalStatus, to: WithdrawalStatus) -> bool {
        matches!(
            (from, to),
            (
                WithdrawalStatus::Pending,
                WithdrawalStatus::Approved | WithdrawalStatus::Rejected
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> UserId {
        UserId::parse("admin-1").unwrap()
    }

    #[test]
    fn test_approve_from_pending() {
        let result = WithdrawalWorkflow::approve(WithdrawalStatus::Pending, admin());
        assert!(result.is_ok());
        assert_eq!(result.unwrap().new_status(), WithdrawalStatus::Approved);
    }

    #[test]
    fn test_approve_from_terminal_fails() {
        for status in [WithdrawalStatus::Approved, WithdrawalStatus::Rejected] {
            let result = WithdrawalWorkflow::approve(status, admin());
            assert!(matches!(
                result,
                Err(WorkflowError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_reject_from_pending() {
        let result = WithdrawalWorkflow::reject(WithdrawalStatus::Pending, admin());
        assert!(result.is_ok());
        assert_eq!(result.unwrap().new_status(), WithdrawalStatus::Rejected);
    }

    #[test]
    fn test_reject_after_approve_fails() {
        let result = WithdrawalWorkflow::reject(WithdrawalStatus::Approved, admin());
        assert_eq!(
            result.unwrap_err(),
            WorkflowError::InvalidTransition {
                from: WithdrawalStatus::Approved,
                to: WithdrawalStatus::Rejected,
            }
        );
    }

    #[test]
    fn test_is_valid_transition() {
        assert!(WithdrawalWorkflow::is_valid_transition(
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved
        ));
        assert!(WithdrawalWorkflow::is_valid_transition(
            WithdrawalStatus::Pending,
            WithdrawalStatus::Rejected
        ));
        assert!(!WithdrawalWorkflow::is_valid_transition(
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected
        ));
        assert!(!WithdrawalWorkflow::is_valid_transition(
            WithdrawalStatus::Rejected,
            WithdrawalStatus::Pending
        ));
        assert!(!WithdrawalWorkflow::is_valid_transition(
            WithdrawalStatus::Pending,
            WithdrawalStatus::Pending
        ));
    }
}
