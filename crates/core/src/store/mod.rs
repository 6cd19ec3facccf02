//! Storage seam for the ledger.
//!
//! Every read hands back the row together with the version it was read at.
//! Writes go through [`LedgerStore::commit`], which applies a [`CommitUnit`]
//! all-or-nothing and only if every written row still carries the version the
//! caller read. A stale version fails the whole unit with
//! [`StoreError::Conflict`]; the caller re-reads and tries again.

pub mod memory;

use async_trait::async_trait;
use ledgerdesk_shared::types::{UserId, WithdrawalId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::ledger::types::{Account, LedgerRecord};
use crate::notification::types::Notification;
use crate::workflow::types::WithdrawalRequest;

pub use memory::MemoryStore;

/// A row paired with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The row.
    pub value: T,
    /// Optimistic-concurrency counter, bumped on every write.
    pub version: i64,
}

impl<T> Versioned<T> {
    /// Pairs a value with its version.
    pub fn new(value: T, version: i64) -> Self {
        Self { value, version }
    }
}

/// Account write guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct AccountWrite {
    /// New account state.
    pub account: Account,
    /// Version the caller read.
    pub expected_version: i64,
}

/// Withdrawal write guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct WithdrawalWrite {
    /// New withdrawal state.
    pub withdrawal: WithdrawalRequest,
    /// Version the caller read.
    pub expected_version: i64,
}

/// Writes that become visible together or not at all.
#[derive(Debug, Clone, Default)]
pub struct CommitUnit {
    /// Guarded account updates.
    pub accounts: Vec<AccountWrite>,
    /// Guarded withdrawal updates.
    pub withdrawals: Vec<WithdrawalWrite>,
    /// Records to append.
    pub records: Vec<LedgerRecord>,
}

impl CommitUnit {
    /// Creates an empty unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a guarded account update.
    #[must_use]
    pub fn with_account(mut self, account: Account, expected_version: i64) -> Self {
        self.accounts.push(AccountWrite {
            account,
            expected_version,
        });
        self
    }

    /// Adds a guarded withdrawal update.
    #[must_use]
    pub fn with_withdrawal(mut self, withdrawal: WithdrawalRequest, expected_version: i64) -> Self {
        self.withdrawals.push(WithdrawalWrite {
            withdrawal,
            expected_version,
        });
        self
    }

    /// Appends a ledger record.
    #[must_use]
    pub fn with_record(mut self, record: LedgerRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Returns true if the unit writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.withdrawals.is_empty() && self.records.is_empty()
    }
}

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A guarded row changed since it was read. Nothing was written.
    #[error("{entity} {id} was modified concurrently")]
    Conflict {
        /// Table or entity name.
        entity: &'static str,
        /// Row key.
        id: String,
    },

    /// The backend failed. The unit may be retried later.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Aggregate figures for the admin overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    /// Number of accounts.
    pub account_count: u64,
    /// Sum of every account balance.
    pub total_balance: Decimal,
    /// Sum of every admin deposit record.
    pub total_deposited: Decimal,
    /// Withdrawals still awaiting a decision.
    pub pending_withdrawals: u64,
}

/// Persistent storage used by the ledger.
///
/// Implementations stamp `recorded_at` on records, and `processed_at` on
/// withdrawals that leave `pending`, with the commit time.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Reads one account.
    async fn account(&self, id: &UserId) -> Result<Option<Versioned<Account>>, StoreError>;

    /// Reads one withdrawal request.
    async fn withdrawal(
        &self,
        id: &WithdrawalId,
    ) -> Result<Option<Versioned<WithdrawalRequest>>, StoreError>;

    /// Snapshot of every account with a balance above zero, ordered by id.
    async fn accounts_with_positive_balance(&self) -> Result<Vec<Versioned<Account>>, StoreError>;

    /// Applies a unit atomically.
    async fn commit(&self, unit: CommitUnit) -> Result<(), StoreError>;

    /// Writes a notification outside any ledger unit.
    async fn insert_notification(&self, notification: Notification) -> Result<(), StoreError>;

    /// Every record for one account, oldest first.
    async fn records_for_user(&self, id: &UserId) -> Result<Vec<LedgerRecord>, StoreError>;

    /// Every withdrawal request for one account.
    async fn withdrawals_for_user(&self, id: &UserId)
    -> Result<Vec<WithdrawalRequest>, StoreError>;

    /// Aggregate figures.
    async fn ledger_summary(&self) -> Result<LedgerSummary, StoreError>;

    /// Accounts ordered by id.
    async fn list_accounts(&self, limit: u64) -> Result<Vec<Account>, StoreError>;

    /// Most recently requested withdrawals first.
    async fn recent_withdrawals(&self, limit: u64) -> Result<Vec<WithdrawalRequest>, StoreError>;

    /// Most recently committed records first.
    async fn recent_records(&self, limit: u64) -> Result<Vec<LedgerRecord>, StoreError>;

    /// Most recently created notifications first.
    async fn recent_notifications(&self, limit: u64) -> Result<Vec<Notification>, StoreError>;
}
