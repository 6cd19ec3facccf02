//! Helpers shared by the crate's tests: a ledger builder and a store with injectable failures.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use ledgerdesk_shared::types::{UserId, WithdrawalId};
use ledgerdesk_shared::config::{AccrualConfig, LedgerConfig, NotificationConfig};
use rust_decimal::Decimal;

use crate::ledger::service::LedgerService;
use crate::ledger::types::{Account, LedgerRecord};
use crate::notification::NotificationDispatcher;
use crate::notification::types::Notification;
use crate::store::{CommitUnit, LedgerStore, LedgerSummary, MemoryStore, StoreError, Versioned};
use crate::workflow::types::WithdrawalRequest;

/// Builds a ledger over `store` with a generous retry budget for contention tests.
pub fn ledger_over(store: Arc<dyn LedgerStore>) -> LedgerService {
    let notifications = NotificationConfig {
        retry_backoff_ms: 1,
        ..NotificationConfig::default()
    };
    let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::clone(&store), &notifications);
    let config = LedgerConfig {
        max_commit_retries: 256,
        ..LedgerConfig::default()
    };
    LedgerService::new(store, dispatcher, config, AccrualConfig::default())
}

/// Wraps a [`MemoryStore`] and fails or races on request.
pub struct FlakyStore {
    inner: MemoryStore,
    failing_notifications: AtomicU32,
    commits_before_outage: AtomicUsize,
    outage_armed: AtomicU32,
    interference: Mutex<Option<(UserId, Decimal)>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_notifications: AtomicU32::new(0),
            commits_before_outage: AtomicUsize::new(0),
            outage_armed: AtomicU32::new(0),
            interference: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// The next `n` notification inserts fail.
    pub fn fail_next_notifications(&self, n: u32) {
        self.failing_notifications.store(n, Ordering::SeqCst);
    }

    /// After `n` more successful commits, every commit fails with a backend error.
    pub fn fail_commits_after(&self, n: usize) {
        self.commits_before_outage.store(n, Ordering::SeqCst);
        self.outage_armed.store(1, Ordering::SeqCst);
    }

    /// Ends an outage started by [`Self::fail_commits_after`].
    pub fn heal(&self) {
        self.outage_armed.store(0, Ordering::SeqCst);
    }

    /// Right before the next commit, credits `amount` to `user` directly,
    /// as a concurrent writer would.
    pub fn interfere_before_next_commit(&self, user: UserId, amount: Decimal) {
        *self.interference.lock().unwrap() = Some((user, amount));
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn account(&self, id: &UserId) -> Result<Option<Versioned<Account>>, StoreError> {
        self.inner.account(id).await
    }

    async fn withdrawal(
        &self,
        id: &WithdrawalId,
    ) -> Result<Option<Versioned<WithdrawalRequest>>, StoreError> {
        self.inner.withdrawal(id).await
    }

    async fn accounts_with_positive_balance(&self) -> Result<Vec<Versioned<Account>>, StoreError> {
        self.inner.accounts_with_positive_balance().await
    }

    async fn commit(&self, unit: CommitUnit) -> Result<(), StoreError> {
        let interference = self.interference.lock().unwrap().take();
        if let Some((user, amount)) = interference {
            let row = self.inner.account(&user).await?.unwrap();
            let balance = row.value.account_balance + amount;
            self.inner
                .commit(CommitUnit::new().with_account(row.value.with_balance(balance), row.version))
                .await?;
        }

        if self.outage_armed.load(Ordering::SeqCst) == 1 {
            let remaining = self.commits_before_outage.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.commits_before_outage
                .store(remaining - 1, Ordering::SeqCst);
        }

        self.inner.commit(unit).await
    }

    async fn insert_notification(&self, notification: Notification) -> Result<(), StoreError> {
        let failing = self.failing_notifications.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_notifications
                .store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("notifications table locked".into()));
        }
        self.inner.insert_notification(notification).await
    }

    async fn records_for_user(&self, id: &UserId) -> Result<Vec<LedgerRecord>, StoreError> {
        self.inner.records_for_user(id).await
    }

    async fn withdrawals_for_user(
        &self,
        id: &UserId,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        self.inner.withdrawals_for_user(id).await
    }

    async fn ledger_summary(&self) -> Result<LedgerSummary, StoreError> {
        self.inner.ledger_summary().await
    }

    async fn list_accounts(&self, limit: u64) -> Result<Vec<Account>, StoreError> {
        self.inner.list_accounts(limit).await
    }

    async fn recent_withdrawals(&self, limit: u64) -> Result<Vec<WithdrawalRequest>, StoreError> {
        self.inner.recent_withdrawals(limit).await
    }

    async fn recent_records(&self, limit: u64) -> Result<Vec<LedgerRecord>, StoreError> {
        self.inner.recent_records(limit).await
    }

    async fn recent_notifications(&self, limit: u64) -> Result<Vec<Notification>, StoreError> {
        self.inner.recent_notifications(limit).await
    }
}
