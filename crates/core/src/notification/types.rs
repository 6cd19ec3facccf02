//! Notification domain types.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerdesk_shared::types::{NotificationId, UserId, format_usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of notification written after a ledger change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An administrator credited the user's balance.
    DepositCredit,
    /// The user's withdrawal was paid out.
    WithdrawalApproved,
    /// The user's withdrawal was declined.
    WithdrawalRejected,
    /// Admin notice summarizing an accrual run.
    RoiAccrualSummary,
}

impl NotificationKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepositCredit => "deposit_credit",
            Self::WithdrawalApproved => "withdrawal_approved",
            Self::WithdrawalRejected => "withdrawal_rejected",
            Self::RoiAccrualSummary => "roi_accrual_summary",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit_credit" => Some(Self::DepositCredit),
            "withdrawal_approved" => Some(Self::WithdrawalApproved),
            "withdrawal_rejected" => Some(Self::WithdrawalRejected),
            "roi_accrual_summary" => Some(Self::RoiAccrualSummary),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write-only message for a user, or for administrators when `user_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// System-generated id.
    pub id: NotificationId,
    /// Recipient; `None` for admin notices.
    pub user_id: Option<UserId>,
    /// Notification kind.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Human-readable text.
    pub message: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn build(user_id: Option<UserId>, kind: NotificationKind, message: String) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            message,
            created_at: Utc::now(),
        }
    }

    /// Tells the user an administrator credited their balance.
    #[must_use]
    pub fn deposit_credit(user_id: UserId, amount: Decimal) -> Self {
        Self::build(
            Some(user_id),
            NotificationKind::DepositCredit,
            format!(
                "{} has been credited to your account balance by Account Manager.",
                format_usd(amount)
            ),
        )
    }

    /// Tells the user their withdrawal was approved.
    #[must_use]
    pub fn withdrawal_approved(user_id: UserId, amount: Decimal) -> Self {
        Self::build(
            Some(user_id),
            NotificationKind::WithdrawalApproved,
            format!("Your withdrawal of {} has been approved.", format_usd(amount)),
        )
    }

    /// Tells the user their withdrawal was rejected.
    #[must_use]
    pub fn withdrawal_rejected(user_id: UserId) -> Self {
        Self::build(
            Some(user_id),
            NotificationKind::WithdrawalRejected,
            "Your withdrawal request was rejected. Please contact support.".to_string(),
        )
    }

    /// Admin notice for a completed accrual run.
    #[must_use]
    pub fn accrual_summary(run_date: NaiveDate, processed: usize, total_credited: Decimal) -> Self {
        Self::build(
            None,
            NotificationKind::RoiAccrualSummary,
            format!(
                "Daily ROI for {run_date} credited {} across {processed} accounts.",
                format_usd(total_credited)
            ),
        )
    }
}
