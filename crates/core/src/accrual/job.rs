//! The daily accrual batch.
//!
//! Accounts are read once as a snapshot and committed in batches. Each batch is
//! one commit. When a batch conflicts with a concurrent writer, its accounts
//! are retried one at a time from a fresh read so the concurrent change is
//! kept. A storage failure stops the run; committed batches stay committed
//! and the `last_accrual_on` guard makes a re-run for the same date safe.

use std::sync::Arc;

use chrono::NaiveDate;
use ledgerdesk_shared::config::RATE_SCALE;
use ledgerdesk_shared::types::UserId;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::calc::{AccrualPlan, plan_accrual};
use crate::ledger::error::LedgerError;
use crate::ledger::types::Account;
use crate::store::{CommitUnit, LedgerStore, Versioned};

/// Summary of one accrual run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualReport {
    /// Date the run accrued for.
    pub run_date: NaiveDate,
    /// Daily rate applied.
    pub rate: Decimal,
    /// Accounts in the positive-balance snapshot.
    pub eligible: usize,
    /// Accounts credited by this run.
    pub processed: usize,
    /// Accounts already accrued for the date.
    pub already_accrued: usize,
    /// Accounts with nothing to credit.
    pub skipped: usize,
    /// Sum credited by this run.
    pub total_credited: Decimal,
}

impl AccrualReport {
    fn empty(run_date: NaiveDate, rate: Decimal) -> Self {
        Self {
            run_date,
            rate,
            eligible: 0,
            processed: 0,
            already_accrued: 0,
            skipped: 0,
            total_credited: Decimal::ZERO,
        }
    }

    /// Operator-facing result line.
    #[must_use]
    pub fn message(&self) -> String {
        if self.processed > 0 {
            format!("ROI successfully processed for {} users.", self.processed)
        } else {
            "ROI complete, no users processed.".to_string()
        }
    }

    fn absorb(&mut self, tally: &Tally) {
        self.processed += tally.processed;
        self.already_accrued += tally.already_accrued;
        self.skipped += tally.skipped;
        self.total_credited += tally.credited;
    }
}

#[derive(Default)]
struct Tally {
    processed: usize,
    already_accrued: usize,
    skipped: usize,
    credited: Decimal,
}

impl Tally {
    fn count(&mut self, plan: &AccrualPlan) {
        match plan {
            AccrualPlan::Credit { record, .. } => {
                self.processed += 1;
                self.credited += record.amount;
            }
            AccrualPlan::AlreadyAccrued => self.already_accrued += 1,
            AccrualPlan::Skip => self.skipped += 1,
        }
    }
}

/// Applies one day's interest to every positive-balance account.
pub struct AccrualJob {
    store: Arc<dyn LedgerStore>,
    rate: Decimal,
    batch_size: usize,
    max_retries: u32,
}

impl AccrualJob {
    /// Creates a job.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rate: Decimal,
        batch_size: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            rate,
            batch_size: batch_size.max(1),
            max_retries,
        }
    }

    /// Runs the accrual for `run_date`.
    ///
    /// # Errors
    ///
    /// - `InvalidRate` if the rate is not positive or has more than
    ///   [`RATE_SCALE`] decimal places
    /// - `Store` if the snapshot cannot be read
    /// - `AccrualIncomplete` if the run stopped after reading the snapshot
    pub async fn run(&self, run_date: NaiveDate) -> Result<AccrualReport, LedgerError> {
        if self.rate <= Decimal::ZERO || self.rate.normalize().scale() > RATE_SCALE {
            return Err(LedgerError::InvalidRate(self.rate));
        }

        let snapshot = self.store.accounts_with_positive_balance().await?;
        let mut report = AccrualReport::empty(run_date, self.rate);
        report.eligible = snapshot.len();

        info!(
            run_date = %run_date,
            rate = %self.rate,
            eligible = snapshot.len(),
            "Starting accrual run"
        );

        for (index, batch) in snapshot.chunks(self.batch_size).enumerate() {
            let before = report.processed;
            if let Err(e) = self.commit_batch(batch, run_date, &mut report).await {
                warn!(
                    error = %e,
                    batch = index,
                    processed = report.processed,
                    "Accrual run stopped"
                );
                return Err(LedgerError::AccrualIncomplete {
                    processed: report.processed,
                    source: Box::new(e),
                });
            }
            debug!(
                batch = index,
                processed = report.processed - before,
                "Accrual batch committed"
            );
        }

        info!(
            run_date = %run_date,
            processed = report.processed,
            already_accrued = report.already_accrued,
            total_credited = %report.total_credited,
            "Accrual run complete"
        );
        Ok(report)
    }

    async fn commit_batch(
        &self,
        batch: &[Versioned<Account>],
        run_date: NaiveDate,
        report: &mut AccrualReport,
    ) -> Result<(), LedgerError> {
        let mut tally = Tally::default();
        let mut unit = CommitUnit::new();

        for row in batch {
            let plan = plan_accrual(&row.value, self.rate, run_date);
            tally.count(&plan);
            if let AccrualPlan::Credit { account, record } = plan {
                unit = unit.with_account(account, row.version).with_record(record);
            }
        }

        if unit.is_empty() {
            report.absorb(&tally);
            return Ok(());
        }

        match self.store.commit(unit).await {
            Ok(()) => {
                report.absorb(&tally);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                debug!(error = %e, "Accrual batch conflicted, retrying accounts individually");
                for row in batch {
                    let plan = self.accrue_one(&row.value.id, run_date).await?;
                    let mut single = Tally::default();
                    single.count(&plan);
                    report.absorb(&single);
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Accrues a single account from a fresh read, retrying on conflict.
    async fn accrue_one(
        &self,
        id: &UserId,
        run_date: NaiveDate,
    ) -> Result<AccrualPlan, LedgerError> {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            let Some(row) = self.store.account(id).await? else {
                return Ok(AccrualPlan::Skip);
            };

            let plan = plan_accrual(&row.value, self.rate, run_date);
            let unit = match &plan {
                AccrualPlan::Credit { account, record } => CommitUnit::new()
                    .with_account(account.clone(), row.version)
                    .with_record(record.clone()),
                AccrualPlan::AlreadyAccrued | AccrualPlan::Skip => return Ok(plan),
            };
            match self.store.commit(unit).await {
                Ok(()) => return Ok(plan),
                Err(e) if e.is_conflict() => {
                    debug!(user_id = %id, attempt, "Accrual conflict, re-reading account");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::ConcurrentModification { attempts })
    }
}
