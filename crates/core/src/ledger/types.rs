//! Ledger domain types: accounts and transaction records.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerdesk_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's account state as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque user identity.
    pub id: UserId,
    /// Contact email, not unique.
    pub email: Option<String>,
    /// Current balance. Never negative.
    pub account_balance: Decimal,
    /// Sum of every accrual ever credited.
    pub total_roi_earned: Decimal,
    /// Administrator capability flag.
    pub is_admin: bool,
    /// Date of the last accrual applied to this account.
    pub last_accrual_on: Option<NaiveDate>,
}

impl Account {
    /// Creates a non-admin account with a zero balance.
    #[must_use]
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self {
            id,
            email,
            account_balance: Decimal::ZERO,
            total_roi_earned: Decimal::ZERO,
            is_admin: false,
            last_accrual_on: None,
        }
    }

    /// Creates an administrator account.
    #[must_use]
    pub fn admin(id: UserId, email: Option<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(id, email)
        }
    }

    /// Returns a copy with the given balance.
    #[must_use]
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.account_balance = balance;
        self
    }
}

/// Kind of ledger-affecting operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Funds credited by an administrator.
    AdminDeposit,
    /// Scheduled interest credited by the accrual job.
    RoiAccrual,
}

impl TransactionKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminDeposit => "admin_deposit",
            Self::RoiAccrual => "roi_accrual",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin_deposit" => Some(Self::AdminDeposit),
            "roi_accrual" => Some(Self::RoiAccrual),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one balance change.
///
/// `recorded_at` is assigned by the store when the record is committed; whatever
/// value the caller supplies is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// System-generated id.
    pub id: TransactionId,
    /// The account the record applies to.
    pub user_id: UserId,
    /// Positive amount credited.
    pub amount: Decimal,
    /// What produced the record.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Administrator who performed a deposit.
    pub processed_by: Option<UserId>,
    /// Account email at the time of a deposit.
    pub email: Option<String>,
    /// Balance read inside the atomic unit.
    pub balance_before: Decimal,
    /// Balance written by the atomic unit.
    pub balance_after: Decimal,
    /// Rate applied, for accrual records.
    pub rate: Option<Decimal>,
    /// Commit timestamp.
    pub recorded_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Builds the record for an administrator deposit.
    #[must_use]
    pub fn admin_deposit(
        account: &Account,
        amount: Decimal,
        processed_by: UserId,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id: account.id.clone(),
            amount,
            kind: TransactionKind::AdminDeposit,
            processed_by: Some(processed_by),
            email: account.email.clone(),
            balance_before: account.account_balance,
            balance_after,
            rate: None,
            recorded_at: Utc::now(),
        }
    }

    /// Builds the record for an interest accrual.
    #[must_use]
    pub fn roi_accrual(
        user_id: UserId,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            amount,
            kind: TransactionKind::RoiAccrual,
            processed_by: None,
            email: None,
            balance_before,
            balance_after,
            rate: Some(rate),
            recorded_at: Utc::now(),
        }
    }

    /// Returns true if `balance_after == balance_before + amount`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.balance_after == self.balance_before + self.amount
    }
}
