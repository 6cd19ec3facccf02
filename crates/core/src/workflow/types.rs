//! Workflow domain types for withdrawal lifecycle management.
//!
//! This module defines the withdrawal request itself, its status, and the
//! actions that move it out of `pending`.

use chrono::{DateTime, Utc};
use ledgerdesk_shared::types::{UserId, WithdrawalId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Withdrawal request status.
///
/// The valid transitions are:
/// - Pending → Approved (approve)
/// - Pending → Rejected (reject)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Raised by the user, awaiting an administrator.
    Pending,
    /// Paid out; the balance was debited.
    Approved,
    /// Declined; the balance was not touched.
    Rejected,
}

impl WithdrawalStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's request to withdraw funds.
///
/// Created by the user-facing flow; the ledger only ever moves it out of
/// `pending`, exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    /// Opaque id.
    pub id: WithdrawalId,
    /// Requesting user.
    pub user_id: UserId,
    /// Requested amount, positive.
    pub amount: Decimal,
    /// Lifecycle status.
    pub status: WithdrawalStatus,
    /// When the user raised the request.
    pub requested_at: DateTime<Utc>,
    /// Administrator who processed it.
    pub processed_by: Option<UserId>,
    /// When it was processed.
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    /// Creates a pending request.
    #[must_use]
    pub fn pending(id: WithdrawalId, user_id: UserId, amount: Decimal) -> Self {
        Self {
            id,
            user_id,
            amount,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_by: None,
            processed_at: None,
        }
    }
}

/// Workflow action representing a state transition with audit data.
#[derive(Debug, Clone)]
pub enum WithdrawalAction {
    /// Approve a pending withdrawal.
    Approve {
        /// The new status after approval.
        new_status: WithdrawalStatus,
        /// The administrator approving the withdrawal.
        approved_by: UserId,
        /// When the withdrawal was approved.
        approved_at: DateTime<Utc>,
    },
    /// Reject a pending withdrawal.
    Reject {
        /// The new status after rejection.
        new_status: WithdrawalStatus,
        /// The administrator rejecting the withdrawal.
        rejected_by: UserId,
        /// When the withdrawal was rejected.
        rejected_at: DateTime<Utc>,
    },
}

impl WithdrawalAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub fn new_status(&self) -> WithdrawalStatus {
        match self {
            Self::Approve { new_status, .. } | Self::Reject { new_status, .. } => *new_status,
        }
    }

    /// Returns a copy of `request` with the action's status and audit fields applied.
    #[must_use]
    pub fn apply(&self, request: &WithdrawalRequest) -> WithdrawalRequest {
        let (processed_by, processed_at) = match self {
            Self::Approve {
                approved_by,
                approved_at,
                ..
            } => (approved_by, approved_at),
            Self::Reject {
                rejected_by,
                rejected_at,
                ..
            } => (rejected_by, rejected_at),
        };

        WithdrawalRequest {
            status: self.new_status(),
            processed_by: Some(processed_by.clone()),
            processed_at: Some(*processed_at),
            ..request.clone()
        }
    }
}
