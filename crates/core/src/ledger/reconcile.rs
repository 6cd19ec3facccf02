//! Audit replay of an account's history.
//!
//! Starting from zero, apply every deposit and accrual record and subtract
//! every approved withdrawal in commit order. The result must equal the stored
//! balance, and each record's `balance_before` must equal the running balance
//! at the point it was written.

use chrono::{DateTime, Utc};
use ledgerdesk_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;

use super::types::{Account, LedgerRecord, TransactionKind};
use crate::workflow::types::{WithdrawalRequest, WithdrawalStatus};

/// Outcome of replaying one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Account replayed.
    pub user_id: UserId,
    /// Balance held by the store.
    pub stored_balance: Decimal,
    /// Balance rebuilt from history.
    pub replayed_balance: Decimal,
    /// `total_roi_earned` held by the store.
    pub stored_roi_earned: Decimal,
    /// Sum of accrual records.
    pub replayed_roi_earned: Decimal,
    /// True when both balance and ROI total agree.
    pub balanced: bool,
    /// Records applied.
    pub records_replayed: usize,
    /// Approved withdrawals applied.
    pub withdrawals_replayed: usize,
    /// Records whose `balance_before` disagrees with the running balance.
    pub broken_links: Vec<TransactionId>,
}

enum Event<'a> {
    Record(&'a LedgerRecord),
    Withdrawal(&'a WithdrawalRequest),
}

impl Event<'_> {
    fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Record(record) => record.recorded_at,
            Self::Withdrawal(w) => w.processed_at.unwrap_or(w.requested_at),
        }
    }
}

/// Replays `records` and `withdrawals` for `account`.
///
/// Records and withdrawals belonging to other accounts are ignored, as are
/// withdrawals that were not approved.
#[must_use]
pub fn replay(
    account: &Account,
    records: &[LedgerRecord],
    withdrawals: &[WithdrawalRequest],
) -> Reconciliation {
    let mut events: Vec<Event<'_>> = records
        .iter()
        .filter(|r| r.user_id == account.id)
        .map(Event::Record)
        .chain(
            withdrawals
                .iter()
                .filter(|w| w.user_id == account.id && w.status == WithdrawalStatus::Approved)
                .map(Event::Withdrawal),
        )
        .collect();
    events.sort_by_key(|event| event.at());

    let mut balance = Decimal::ZERO;
    let mut roi = Decimal::ZERO;
    let mut records_replayed = 0;
    let mut withdrawals_replayed = 0;
    let mut broken_links = Vec::new();

    for event in events {
        match event {
            Event::Record(record) => {
                if record.balance_before != balance || !record.is_consistent() {
                    broken_links.push(record.id);
                }
                balance += record.amount;
                if record.kind == TransactionKind::RoiAccrual {
                    roi += record.amount;
                }
                records_replayed += 1;
            }
            Event::Withdrawal(withdrawal) => {
                balance -= withdrawal.amount;
                withdrawals_replayed += 1;
            }
        }
    }

    Reconciliation {
        user_id: account.id.clone(),
        stored_balance: account.account_balance,
        replayed_balance: balance,
        stored_roi_earned: account.total_roi_earned,
        replayed_roi_earned: roi,
        balanced: balance == account.account_balance && roi == account.total_roi_earned,
        records_replayed,
        withdrawals_replayed,
        broken_links,
    }
}
