//! Mapping between `SeaORM` models and ledger domain types.

use chrono::{DateTime, Utc};
use ledgerdesk_core::ledger::types::{Account, LedgerRecord, TransactionKind};
use ledgerdesk_core::notification::types::{Notification, NotificationKind};
use ledgerdesk_core::store::Versioned;
use ledgerdesk_core::workflow::types::{WithdrawalRequest, WithdrawalStatus};
use ledgerdesk_shared::types::{NotificationId, TransactionId, UserId, WithdrawalId};
use sea_orm::Set;

use super::DbStoreError;
use crate::entities::{accounts, ledger_transactions, notifications, withdrawals};

fn corrupt(table: &'static str, detail: impl Into<String>) -> DbStoreError {
    DbStoreError::Corrupt {
        table,
        detail: detail.into(),
    }
}

fn user_id(table: &'static str, raw: &str) -> Result<UserId, DbStoreError> {
    UserId::parse(raw).ok_or_else(|| corrupt(table, "blank user id"))
}

fn optional_user_id(table: &'static str, raw: Option<&str>) -> Result<Option<UserId>, DbStoreError> {
    raw.map(|raw| user_id(table, raw)).transpose()
}

/// Converts an account row.
///
/// # Errors
///
/// Returns `Corrupt` if the id is blank.
pub fn account_from_model(model: accounts::Model) -> Result<Versioned<Account>, DbStoreError> {
    let account = Account {
        id: user_id("accounts", &model.id)?,
        email: model.email,
        account_balance: model.account_balance,
        total_roi_earned: model.total_roi_earned,
        is_admin: model.is_admin,
        last_accrual_on: model.last_accrual_on,
    };
    Ok(Versioned::new(account, model.version))
}

/// Converts a ledger transaction row.
///
/// # Errors
///
/// Returns `Corrupt` for a blank user id or an unknown transaction type.
pub fn record_from_model(model: ledger_transactions::Model) -> Result<LedgerRecord, DbStoreError> {
    let kind = TransactionKind::parse(&model.transaction_type).ok_or_else(|| {
        corrupt(
            "ledger_transactions",
            format!("unknown transaction type {}", model.transaction_type),
        )
    })?;

    Ok(LedgerRecord {
        id: TransactionId::from_uuid(model.id),
        user_id: user_id("ledger_transactions", &model.user_id)?,
        amount: model.amount,
        kind,
        processed_by: optional_user_id("ledger_transactions", model.processed_by.as_deref())?,
        email: model.email,
        balance_before: model.balance_before,
        balance_after: model.balance_after,
        rate: model.rate,
        recorded_at: model.recorded_at.with_timezone(&Utc),
    })
}

/// Converts a withdrawal row.
///
/// # Errors
///
/// Returns `Corrupt` for a blank key or an unknown status.
pub fn withdrawal_from_model(
    model: withdrawals::Model,
) -> Result<Versioned<WithdrawalRequest>, DbStoreError> {
    let status = WithdrawalStatus::parse(&model.status)
        .ok_or_else(|| corrupt("withdrawals", format!("unknown status {}", model.status)))?;
    let id = WithdrawalId::parse(&model.id).ok_or_else(|| corrupt("withdrawals", "blank id"))?;

    let withdrawal = WithdrawalRequest {
        id,
        user_id: user_id("withdrawals", &model.user_id)?,
        amount: model.amount,
        status,
        requested_at: model.requested_at.with_timezone(&Utc),
        processed_by: optional_user_id("withdrawals", model.processed_by.as_deref())?,
        processed_at: model.processed_at.map(|at| at.with_timezone(&Utc)),
    };
    Ok(Versioned::new(withdrawal, model.version))
}

/// Converts a notification row.
///
/// # Errors
///
/// Returns `Corrupt` for an unknown notification type.
pub fn notification_from_model(model: notifications::Model) -> Result<Notification, DbStoreError> {
    let kind = NotificationKind::parse(&model.notification_type).ok_or_else(|| {
        corrupt(
            "notifications",
            format!("unknown notification type {}", model.notification_type),
        )
    })?;

    Ok(Notification {
        id: NotificationId::from_uuid(model.id),
        user_id: optional_user_id("notifications", model.user_id.as_deref())?,
        kind,
        message: model.message,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub(super) fn record_to_active(
    record: &LedgerRecord,
    committed_at: DateTime<Utc>,
) -> ledger_transactions::ActiveModel {
    ledger_transactions::ActiveModel {
        id: Set(record.id.into_inner()),
        user_id: Set(record.user_id.to_string()),
        amount: Set(record.amount),
        transaction_type: Set(record.kind.as_str().to_string()),
        processed_by: Set(record.processed_by.as_ref().map(ToString::to_string)),
        email: Set(record.email.clone()),
        balance_before: Set(record.balance_before),
        balance_after: Set(record.balance_after),
        rate: Set(record.rate),
        recorded_at: Set(committed_at.fixed_offset()),
    }
}

pub(super) fn account_to_active(account: &Account, now: DateTime<Utc>) -> accounts::ActiveModel {
    accounts::ActiveModel {
        id: Set(account.id.to_string()),
        email: Set(account.email.clone()),
        account_balance: Set(account.account_balance),
        total_roi_earned: Set(account.total_roi_earned),
        is_admin: Set(account.is_admin),
        last_accrual_on: Set(account.last_accrual_on),
        version: Set(1),
        created_at: Set(now.fixed_offset()),
        updated_at: Set(now.fixed_offset()),
    }
}

pub(super) fn withdrawal_to_active(withdrawal: &WithdrawalRequest) -> withdrawals::ActiveModel {
    withdrawals::ActiveModel {
        id: Set(withdrawal.id.to_string()),
        user_id: Set(withdrawal.user_id.to_string()),
        amount: Set(withdrawal.amount),
        status: Set(withdrawal.status.as_str().to_string()),
        requested_at: Set(withdrawal.requested_at.fixed_offset()),
        processed_by: Set(withdrawal.processed_by.as_ref().map(ToString::to_string)),
        processed_at: Set(withdrawal.processed_at.map(|at| at.fixed_offset())),
        version: Set(1),
    }
}

pub(super) fn notification_to_active(notification: &Notification) -> notifications::ActiveModel {
    notifications::ActiveModel {
        id: Set(notification.id.into_inner()),
        user_id: Set(notification.user_id.as_ref().map(ToString::to_string)),
        notification_type: Set(notification.kind.as_str().to_string()),
        message: Set(notification.message.clone()),
        created_at: Set(notification.created_at.fixed_offset()),
    }
}
