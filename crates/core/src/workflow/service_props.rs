//! Property-based tests for WithdrawalWorkflow.

use proptest::prelude::*;

use crate::workflow::error::WorkflowError;
use crate::workflow::service::WithdrawalWorkflow;
use crate::workflow::types::{WithdrawalAction, WithdrawalStatus};
use ledgerdesk_shared::types::UserId;

/// Strategy for generating random WithdrawalStatus values.
fn arb_status() -> impl Strategy<Value = WithdrawalStatus> {
    prop_oneof![
        Just(WithdrawalStatus::Pending),
        Just(WithdrawalStatus::Approved),
        Just(WithdrawalStatus::Rejected),
    ]
}

/// Strategy for generating admin identities.
fn arb_admin() -> impl Strategy<Value = UserId> {
    "[a-zA-Z0-9]{1,28}".prop_map(|s| UserId::parse(&s).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Pending + approve → Approved, recording who approved.
    #[test]
    fn prop_approve_from_pending_succeeds(admin in arb_admin()) {
        let action = WithdrawalWorkflow::approve(WithdrawalStatus::Pending, admin.clone()).unwrap();
        prop_assert_eq!(action.new_status(), WithdrawalStatus::Approved);

        if let WithdrawalAction::Approve { approved_by, .. } = action {
            prop_assert_eq!(approved_by, admin);
        } else {
            prop_assert!(false, "Expected Approve action");
        }
    }

    /// Terminal states never transition again, whatever the action.
    #[test]
    fn prop_terminal_states_are_final(status in arb_status(), admin in arb_admin()) {
        prop_assume!(status.is_terminal());

        let approve = WithdrawalWorkflow::approve(status, admin.clone());
        let is_invalid_transition = matches!(approve, Err(WorkflowError::InvalidTransition { .. }));
        prop_assert!(is_invalid_transition);

        let reject = WithdrawalWorkflow::reject(status, admin);
        let is_invalid_transition = matches!(reject, Err(WorkflowError::InvalidTransition { .. }));
        prop_assert!(is_invalid_transition);
    }

    /// Every successful action agrees with is_valid_transition.
    #[test]
    fn prop_actions_match_transition_table(status in arb_status(), admin in arb_admin()) {
        if let Ok(action) = WithdrawalWorkflow::approve(status, admin.clone()) {
            prop_assert!(WithdrawalWorkflow::is_valid_transition(status, action.new_status()));
        }
        if let Ok(action) = WithdrawalWorkflow::reject(status, admin) {
            prop_assert!(WithdrawalWorkflow::is_valid_transition(status, action.new_status()));
        }
    }
}
