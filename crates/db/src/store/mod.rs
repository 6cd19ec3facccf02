//! PostgreSQL implementation of [`LedgerStore`].
//!
//! A [`CommitUnit`] runs inside one database transaction. Each guarded row is
//! updated with `WHERE id = ? AND version = ?`; if any update touches no row
//! the transaction is rolled back and the caller sees a conflict.
//!
//! Commit timestamps come from the database clock, not the writer's host, so
//! every server and accrual process stamps from the same source.

mod convert;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use ledgerdesk_core::ledger::types::{Account, LedgerRecord, TransactionKind};
use ledgerdesk_core::notification::types::Notification;
use ledgerdesk_core::store::{
    AccountWrite, CommitUnit, LedgerStore, LedgerSummary, StoreError, Versioned, WithdrawalWrite,
};
use ledgerdesk_core::workflow::types::{WithdrawalRequest, WithdrawalStatus};
use ledgerdesk_shared::types::{UserId, WithdrawalId};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait,
};
use tracing::{debug, error};

use crate::entities::{accounts, ledger_transactions, notifications, withdrawals};

pub use convert::{
    account_from_model, notification_from_model, record_from_model, withdrawal_from_model,
};

/// Error types for ledger storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbStoreError {
    /// A guarded row changed since it was read.
    #[error("{entity} {id} was modified concurrently")]
    Conflict {
        /// Table name.
        entity: &'static str,
        /// Row key.
        id: String,
    },

    /// A stored row cannot be represented in the domain.
    #[error("Corrupt row in {table}: {detail}")]
    Corrupt {
        /// Table name.
        table: &'static str,
        /// What was wrong.
        detail: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<DbStoreError> for StoreError {
    fn from(err: DbStoreError) -> Self {
        match err {
            DbStoreError::Conflict { entity, id } => Self::Conflict { entity, id },
            other => Self::Backend(other.to_string()),
        }
    }
}

fn backend(err: DbErr) -> StoreError {
    error!(error = %err, "Ledger storage query failed");
    StoreError::Backend(err.to_string())
}

/// Ledger storage backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a store over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn apply(&self, unit: CommitUnit) -> Result<(), DbStoreError> {
        let txn = self.db.begin().await?;
        let committed_at = database_clock(&txn).await?;

        for write in &unit.accounts {
            if !update_account(&txn, write, committed_at).await? {
                txn.rollback().await?;
                return Err(DbStoreError::Conflict {
                    entity: "account",
                    id: write.account.id.to_string(),
                });
            }
        }

        for write in &unit.withdrawals {
            if !update_withdrawal(&txn, write, committed_at).await? {
                txn.rollback().await?;
                return Err(DbStoreError::Conflict {
                    entity: "withdrawal",
                    id: write.withdrawal.id.to_string(),
                });
            }
        }

        if !unit.records.is_empty() {
            let rows = unit
                .records
                .iter()
                .map(|record| convert::record_to_active(record, committed_at));
            ledger_transactions::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        debug!(
            accounts = unit.accounts.len(),
            withdrawals = unit.withdrawals.len(),
            records = unit.records.len(),
            "Ledger unit committed"
        );
        Ok(())
    }

    async fn sum_deposits(&self) -> Result<Decimal, DbErr> {
        let total: Option<Option<Decimal>> = ledger_transactions::Entity::find()
            .select_only()
            .column_as(ledger_transactions::Column::Amount.sum(), "total")
            .filter(
                ledger_transactions::Column::TransactionType
                    .eq(TransactionKind::AdminDeposit.as_str()),
            )
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(total.flatten().unwrap_or_default())
    }

    async fn sum_balances(&self) -> Result<Decimal, DbErr> {
        let total: Option<Option<Decimal>> = accounts::Entity::find()
            .select_only()
            .column_as(accounts::Column::AccountBalance.sum(), "total")
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(total.flatten().unwrap_or_default())
    }

    /// Inserts or replaces an account row at version 1.
    ///
    /// Used for provisioning; ledger mutations go through [`LedgerStore::commit`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn upsert_account(&self, account: &Account) -> Result<(), DbStoreError> {
        use sea_orm::sea_query::OnConflict;

        accounts::Entity::insert(convert::account_to_active(account, Utc::now()))
            .on_conflict(
                OnConflict::column(accounts::Column::Id)
                    .update_columns([
                        accounts::Column::Email,
                        accounts::Column::AccountBalance,
                        accounts::Column::TotalRoiEarned,
                        accounts::Column::IsAdmin,
                        accounts::Column::LastAccrualOn,
                        accounts::Column::Version,
                        accounts::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Inserts a withdrawal request, as the user-facing request flow would.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails or the id already exists.
    pub async fn insert_withdrawal(
        &self,
        withdrawal: &WithdrawalRequest,
    ) -> Result<(), DbStoreError> {
        withdrawals::Entity::insert(convert::withdrawal_to_active(withdrawal))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }
}

#[derive(Debug, FromQueryResult)]
struct ClockRow {
    now: DateTime<FixedOffset>,
}

/// Reads the database server's clock inside `txn`.
async fn database_clock(txn: &DatabaseTransaction) -> Result<DateTime<Utc>, DbErr> {
    let stmt = Statement::from_string(
        txn.get_database_backend(),
        "SELECT clock_timestamp() AS now",
    );
    ClockRow::find_by_statement(stmt)
        .one(txn)
        .await?
        .map(|row| row.now.with_timezone(&Utc))
        .ok_or_else(|| DbErr::RecordNotFound("clock_timestamp()".to_string()))
}

/// Applies one guarded account write. Returns false if the guard failed.
async fn update_account(
    txn: &DatabaseTransaction,
    write: &AccountWrite,
    committed_at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let account = &write.account;
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::AccountBalance,
            Expr::value(account.account_balance),
        )
        .col_expr(
            accounts::Column::TotalRoiEarned,
            Expr::value(account.total_roi_earned),
        )
        .col_expr(
            accounts::Column::LastAccrualOn,
            Expr::value(account.last_accrual_on),
        )
        .col_expr(
            accounts::Column::Version,
            Expr::col(accounts::Column::Version).add(1),
        )
        .col_expr(
            accounts::Column::UpdatedAt,
            Expr::value(committed_at.fixed_offset()),
        )
        .filter(accounts::Column::Id.eq(account.id.as_str()))
        .filter(accounts::Column::Version.eq(write.expected_version))
        .exec(txn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Applies one guarded withdrawal write. Returns false if the guard failed.
async fn update_withdrawal(
    txn: &DatabaseTransaction,
    write: &WithdrawalWrite,
    committed_at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let withdrawal = &write.withdrawal;
    let processed_at = if withdrawal.status.is_terminal() {
        Some(committed_at.fixed_offset())
    } else {
        withdrawal.processed_at.map(|at| at.fixed_offset())
    };

    let result = withdrawals::Entity::update_many()
        .col_expr(
            withdrawals::Column::Status,
            Expr::value(withdrawal.status.as_str()),
        )
        .col_expr(
            withdrawals::Column::ProcessedBy,
            Expr::value(withdrawal.processed_by.as_ref().map(ToString::to_string)),
        )
        .col_expr(withdrawals::Column::ProcessedAt, Expr::value(processed_at))
        .col_expr(
            withdrawals::Column::Version,
            Expr::col(withdrawals::Column::Version).add(1),
        )
        .filter(withdrawals::Column::Id.eq(withdrawal.id.as_str()))
        .filter(withdrawals::Column::Version.eq(write.expected_version))
        .exec(txn)
        .await?;

    Ok(result.rows_affected == 1)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn account(&self, id: &UserId) -> Result<Option<Versioned<Account>>, StoreError> {
        let model = accounts::Entity::find_by_id(id.as_str())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(account_from_model).transpose()?)
    }

    async fn withdrawal(
        &self,
        id: &WithdrawalId,
    ) -> Result<Option<Versioned<WithdrawalRequest>>, StoreError> {
        let model = withdrawals::Entity::find_by_id(id.as_str())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(withdrawal_from_model).transpose()?)
    }

    async fn accounts_with_positive_balance(&self) -> Result<Vec<Versioned<Account>>, StoreError> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::AccountBalance.gt(Decimal::ZERO))
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(account_from_model)
            .collect::<Result<_, _>>()?)
    }

    async fn commit(&self, unit: CommitUnit) -> Result<(), StoreError> {
        if unit.is_empty() {
            return Ok(());
        }
        self.apply(unit).await.map_err(|e| {
            if !matches!(e, DbStoreError::Conflict { .. }) {
                error!(error = %e, "Ledger commit failed");
            }
            StoreError::from(e)
        })
    }

    async fn insert_notification(&self, notification: Notification) -> Result<(), StoreError> {
        notifications::Entity::insert(convert::notification_to_active(&notification))
            .exec_without_returning(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn records_for_user(&self, id: &UserId) -> Result<Vec<LedgerRecord>, StoreError> {
        let models = ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::UserId.eq(id.as_str()))
            .order_by_asc(ledger_transactions::Column::RecordedAt)
            .order_by_asc(ledger_transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(record_from_model)
            .collect::<Result<_, _>>()?)
    }

    async fn withdrawals_for_user(
        &self,
        id: &UserId,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let models = withdrawals::Entity::find()
            .filter(withdrawals::Column::UserId.eq(id.as_str()))
            .order_by_asc(withdrawals::Column::RequestedAt)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(|model| withdrawal_from_model(model).map(|row| row.value))
            .collect::<Result<_, _>>()?)
    }

    async fn ledger_summary(&self) -> Result<LedgerSummary, StoreError> {
        let account_count = accounts::Entity::find()
            .count(&self.db)
            .await
            .map_err(backend)?;
        let pending_withdrawals = withdrawals::Entity::find()
            .filter(withdrawals::Column::Status.eq(WithdrawalStatus::Pending.as_str()))
            .count(&self.db)
            .await
            .map_err(backend)?;
        let total_balance = self.sum_balances().await.map_err(backend)?;
        let total_deposited = self.sum_deposits().await.map_err(backend)?;

        Ok(LedgerSummary {
            account_count,
            total_balance,
            total_deposited,
            pending_withdrawals,
        })
    }

    async fn list_accounts(&self, limit: u64) -> Result<Vec<Account>, StoreError> {
        let models = accounts::Entity::find()
            .order_by_asc(accounts::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(|model| account_from_model(model).map(|row| row.value))
            .collect::<Result<_, _>>()?)
    }

    async fn recent_withdrawals(&self, limit: u64) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let models = withdrawals::Entity::find()
            .order_by_desc(withdrawals::Column::RequestedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(|model| withdrawal_from_model(model).map(|row| row.value))
            .collect::<Result<_, _>>()?)
    }

    async fn recent_records(&self, limit: u64) -> Result<Vec<LedgerRecord>, StoreError> {
        let models = ledger_transactions::Entity::find()
            .order_by_desc(ledger_transactions::Column::RecordedAt)
            .order_by_desc(ledger_transactions::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(record_from_model)
            .collect::<Result<_, _>>()?)
    }

    async fn recent_notifications(&self, limit: u64) -> Result<Vec<Notification>, StoreError> {
        let models = notifications::Entity::find()
            .order_by_desc(notifications::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models
            .into_iter()
            .map(notification_from_model)
            .collect::<Result<_, _>>()?)
    }
}
