//! In-process [`LedgerStore`] backend.
//!
//! Used by tests and by the server when `database.url` is `memory://`. One
//! `RwLock` guards all tables, so a commit validates and applies under a single
//! write lock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ledgerdesk_shared::types::{UserId, WithdrawalId};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{CommitUnit, LedgerStore, LedgerSummary, StoreError, Versioned};
use crate::ledger::types::{Account, LedgerRecord, TransactionKind};
use crate::notification::types::Notification;
use crate::workflow::types::{WithdrawalRequest, WithdrawalStatus};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<UserId, Versioned<Account>>,
    withdrawals: BTreeMap<WithdrawalId, Versioned<WithdrawalRequest>>,
    records: Vec<LedgerRecord>,
    notifications: Vec<Notification>,
    last_commit_at: Option<DateTime<Utc>>,
}

impl Tables {
    /// Commit timestamp, strictly increasing per store.
    fn next_commit_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_commit_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_commit_at = Some(stamp);
        stamp
    }
}

fn limit_to_usize(limit: u64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// In-memory ledger store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an account at version 1, replacing any existing row.
    pub async fn insert_account(&self, account: Account) {
        let mut tables = self.tables.write().await;
        tables
            .accounts
            .insert(account.id.clone(), Versioned::new(account, 1));
    }

    /// Seeds a withdrawal request at version 1, replacing any existing row.
    pub async fn insert_withdrawal(&self, withdrawal: WithdrawalRequest) {
        let mut tables = self.tables.write().await;
        tables
            .withdrawals
            .insert(withdrawal.id.clone(), Versioned::new(withdrawal, 1));
    }

    /// Every committed record, in commit order.
    pub async fn records(&self) -> Vec<LedgerRecord> {
        self.tables.read().await.records.clone()
    }

    /// Every delivered notification, in delivery order.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.tables.read().await.notifications.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn account(&self, id: &UserId) -> Result<Option<Versioned<Account>>, StoreError> {
        Ok(self.tables.read().await.accounts.get(id).cloned())
    }

    async fn withdrawal(
        &self,
        id: &WithdrawalId,
    ) -> Result<Option<Versioned<WithdrawalRequest>>, StoreError> {
        Ok(self.tables.read().await.withdrawals.get(id).cloned())
    }

    async fn accounts_with_positive_balance(&self) -> Result<Vec<Versioned<Account>>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|row| row.value.account_balance > Decimal::ZERO)
            .cloned()
            .collect())
    }

    async fn commit(&self, unit: CommitUnit) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        // Validate every guard before touching anything.
        for write in &unit.accounts {
            let current = tables.accounts.get(&write.account.id).map(|row| row.version);
            if current != Some(write.expected_version) {
                return Err(StoreError::Conflict {
                    entity: "account",
                    id: write.account.id.to_string(),
                });
            }
        }
        for write in &unit.withdrawals {
            let current = tables
                .withdrawals
                .get(&write.withdrawal.id)
                .map(|row| row.version);
            if current != Some(write.expected_version) {
                return Err(StoreError::Conflict {
                    entity: "withdrawal",
                    id: write.withdrawal.id.to_string(),
                });
            }
        }

        let committed_at = tables.next_commit_at();

        for write in unit.accounts {
            let version = write.expected_version + 1;
            tables
                .accounts
                .insert(write.account.id.clone(), Versioned::new(write.account, version));
        }
        for write in unit.withdrawals {
            let version = write.expected_version + 1;
            let mut withdrawal = write.withdrawal;
            if withdrawal.status.is_terminal() {
                withdrawal.processed_at = Some(committed_at);
            }
            tables
                .withdrawals
                .insert(withdrawal.id.clone(), Versioned::new(withdrawal, version));
        }
        for mut record in unit.records {
            record.recorded_at = committed_at;
            tables.records.push(record);
        }

        Ok(())
    }

    async fn insert_notification(&self, notification: Notification) -> Result<(), StoreError> {
        self.tables.write().await.notifications.push(notification);
        Ok(())
    }

    async fn records_for_user(&self, id: &UserId) -> Result<Vec<LedgerRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .filter(|record| &record.user_id == id)
            .cloned()
            .collect())
    }

    async fn withdrawals_for_user(
        &self,
        id: &UserId,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .withdrawals
            .values()
            .filter(|row| &row.value.user_id == id)
            .map(|row| row.value.clone())
            .collect())
    }

    async fn ledger_summary(&self) -> Result<LedgerSummary, StoreError> {
        let tables = self.tables.read().await;
        Ok(LedgerSummary {
            account_count: tables.accounts.len() as u64,
            total_balance: tables
                .accounts
                .values()
                .map(|row| row.value.account_balance)
                .sum(),
            total_deposited: tables
                .records
                .iter()
                .filter(|record| record.kind == TransactionKind::AdminDeposit)
                .map(|record| record.amount)
                .sum(),
            pending_withdrawals: tables
                .withdrawals
                .values()
                .filter(|row| row.value.status == WithdrawalStatus::Pending)
                .count() as u64,
        })
    }

    async fn list_accounts(&self, limit: u64) -> Result<Vec<Account>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .take(limit_to_usize(limit))
            .map(|row| row.value.clone())
            .collect())
    }

    async fn recent_withdrawals(&self, limit: u64) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let tables = self.tables.read().await;
        let mut withdrawals: Vec<_> = tables
            .withdrawals
            .values()
            .map(|row| row.value.clone())
            .collect();
        withdrawals.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        withdrawals.truncate(limit_to_usize(limit));
        Ok(withdrawals)
    }

    async fn recent_records(&self, limit: u64) -> Result<Vec<LedgerRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .rev()
            .take(limit_to_usize(limit))
            .cloned()
            .collect())
    }

    async fn recent_notifications(&self, limit: u64) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .take(limit_to_usize(limit))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_stamps_records() {
        let store = MemoryStore::new();
        store
            .insert_account(Account::new(user("u1"), None).with_balance(dec!(10)))
            .await;

        let row = store.account(&user("u1")).await.unwrap().unwrap();
        assert_eq!(row.version, 1);

        let updated = row.value.clone().with_balance(dec!(15));
        let record = LedgerRecord::admin_deposit(&row.value, dec!(5), user("admin"), dec!(15));
        store
            .commit(CommitUnit::new().with_account(updated, 1).with_record(record))
            .await
            .unwrap();

        let row = store.account(&user("u1")).await.unwrap().unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(row.value.account_balance, dec!(15));
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_writes_nothing() {
        let store = MemoryStore::new();
        store.insert_account(Account::new(user("u1"), None)).await;
        store.insert_account(Account::new(user("u2"), None)).await;

        let unit = CommitUnit::new()
            .with_account(Account::new(user("u1"), None).with_balance(dec!(1)), 1)
            .with_account(Account::new(user("u2"), None).with_balance(dec!(1)), 7)
            .with_record(LedgerRecord::roi_accrual(
                user("u1"),
                dec!(1),
                dec!(0),
                dec!(1),
                dec!(0.01),
            ));

        let err = store.commit(unit).await.unwrap_err();
        assert!(err.is_conflict());

        let u1 = store.account(&user("u1")).await.unwrap().unwrap();
        assert_eq!(u1.version, 1);
        assert_eq!(u1.value.account_balance, Decimal::ZERO);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_row_is_a_conflict() {
        let store = MemoryStore::new();
        let unit = CommitUnit::new().with_account(Account::new(user("ghost"), None), 1);
        assert!(store.commit(unit).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_commit_timestamps_strictly_increase() {
        let store = MemoryStore::new();
        for _ in 0..20 {
            let record =
                LedgerRecord::roi_accrual(user("u1"), dec!(1), dec!(0), dec!(1), dec!(0.01));
            store
                .commit(CommitUnit::new().with_record(record))
                .await
                .unwrap();
        }

        let records = store.records().await;
        assert!(records.windows(2).all(|w| w[0].recorded_at < w[1].recorded_at));
    }

    #[tokio::test]
    async fn test_processed_withdrawal_gets_commit_time() {
        let store = MemoryStore::new();
        let pending = WithdrawalRequest::pending(
            WithdrawalId::parse("w1").unwrap(),
            user("u1"),
            dec!(5),
        );
        store.insert_withdrawal(pending.clone()).await;

        let processed = WithdrawalRequest {
            status: WithdrawalStatus::Rejected,
            processed_by: Some(user("admin")),
            processed_at: None,
            ..pending
        };
        store
            .commit(CommitUnit::new().with_withdrawal(processed, 1))
            .await
            .unwrap();

        let row = store
            .withdrawal(&WithdrawalId::parse("w1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.version, 2);
        assert!(row.value.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_positive_balance_snapshot_and_summary() {
        let store = MemoryStore::new();
        store.insert_account(Account::new(user("a"), None)).await;
        store
            .insert_account(Account::new(user("b"), None).with_balance(dec!(100)))
            .await;
        store
            .insert_account(Account::new(user("c"), None).with_balance(dec!(250)))
            .await;
        store
            .insert_withdrawal(WithdrawalRequest::pending(
                WithdrawalId::parse("w1").unwrap(),
                user("b"),
                dec!(10),
            ))
            .await;

        let positive = store.accounts_with_positive_balance().await.unwrap();
        let ids: Vec<_> = positive.iter().map(|row| row.value.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let summary = store.ledger_summary().await.unwrap();
        assert_eq!(summary.account_count, 3);
        assert_eq!(summary.total_balance, dec!(350));
        assert_eq!(summary.total_deposited, Decimal::ZERO);
        assert_eq!(summary.pending_withdrawals, 1);

        assert_eq!(store.list_accounts(2).await.unwrap().len(), 2);
    }
}
