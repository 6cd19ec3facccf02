//! Ledger service: every operation that mutates a balance.
//!
//! Each operation authorizes the caller, validates its input, then runs a
//! read-compute-commit cycle against the store. The commit carries the
//! versions that were read; if another writer got there first the cycle is
//! repeated from a fresh read, up to `max_commit_retries` times. Notifications
//! are queued only after the commit succeeded.

use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use ledgerdesk_shared::config::{AccrualConfig, AppConfig, LedgerConfig};
use ledgerdesk_shared::types::{
    MAX_MONEY, TransactionId, UserId, WithdrawalId, checked_money_add, format_usd,
    has_fractional_cents,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::auth::{AdminIdentity, authorize_admin};
use super::error::{LedgerError, describe_shortfall};
use super::reconcile::{Reconciliation, replay};
use super::types::{Account, LedgerRecord};
use crate::accrual::{AccrualJob, AccrualReport};
use crate::notification::{Notification, NotificationDispatcher};
use crate::store::{CommitUnit, LedgerStore, LedgerSummary};
use crate::workflow::service::WithdrawalWorkflow;
use crate::workflow::types::{WithdrawalRequest, WithdrawalStatus};

const INVALID_DEPOSIT: &str = "Invalid user ID or deposit amount.";
const INVALID_REQUEST: &str = "Invalid request data.";

/// Input for an administrator deposit.
#[derive(Debug, Clone, Default)]
pub struct DepositInput {
    /// Account to credit.
    pub target_user_id: Option<String>,
    /// Amount to credit.
    pub amount: Option<Decimal>,
}

/// Input for approving a withdrawal.
#[derive(Debug, Clone, Default)]
pub struct ApproveWithdrawalInput {
    /// Withdrawal to approve.
    pub withdrawal_id: Option<String>,
    /// Requester as the caller saw it.
    pub user_id: Option<String>,
    /// Amount as the caller saw it.
    pub amount: Option<Decimal>,
}

/// Input for rejecting a withdrawal.
#[derive(Debug, Clone, Default)]
pub struct RejectWithdrawalInput {
    /// Withdrawal to reject.
    pub withdrawal_id: Option<String>,
}

/// Result of a committed deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    /// Record written.
    pub transaction_id: TransactionId,
    /// Account credited.
    pub user_id: UserId,
    /// Amount credited.
    pub amount: Decimal,
    /// Balance after the deposit.
    pub balance_after: Decimal,
}

impl DepositReceipt {
    /// Operator-facing result line.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Deposit of {} to {} successful.",
            format_usd(self.amount),
            self.user_id
        )
    }
}

/// Result of a committed withdrawal decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalReceipt {
    /// Withdrawal processed.
    pub withdrawal_id: WithdrawalId,
    /// Requesting account.
    pub user_id: UserId,
    /// Withdrawal amount.
    pub amount: Decimal,
    /// Final status.
    pub status: WithdrawalStatus,
    /// Balance after an approval; `None` for a rejection.
    pub balance_after: Option<Decimal>,
}

impl WithdrawalReceipt {
    /// Operator-facing result line.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Withdrawal {} {}.", self.withdrawal_id, self.status)
    }
}

/// Admin console overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Aggregate figures.
    pub summary: LedgerSummary,
    /// Accounts, ordered by id.
    pub accounts: Vec<Account>,
    /// Latest withdrawal requests.
    pub withdrawals: Vec<WithdrawalRequest>,
    /// Latest ledger records.
    pub transactions: Vec<LedgerRecord>,
    /// Latest notifications.
    pub notifications: Vec<Notification>,
}

/// Validates a monetary amount: present, positive, whole cents, within column capacity.
fn validate_amount(amount: Option<Decimal>, message: &str) -> Result<Decimal, LedgerError> {
    match amount {
        Some(a) if a > Decimal::ZERO && a <= MAX_MONEY && !has_fractional_cents(a) => Ok(a),
        _ => Err(LedgerError::invalid(message)),
    }
}

/// The balance-mutation ledger.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    notifications: NotificationDispatcher,
    config: LedgerConfig,
    accrual: AccrualConfig,
}

impl LedgerService {
    /// Creates a ledger over `store`, delivering notifications through `notifications`.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifications: NotificationDispatcher,
        config: LedgerConfig,
        accrual: AccrualConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            config,
            accrual,
        }
    }

    /// Builds a ledger from application settings and starts its notification worker.
    pub fn from_config(
        store: Arc<dyn LedgerStore>,
        config: &AppConfig,
    ) -> (Self, JoinHandle<()>) {
        let (notifications, worker) =
            NotificationDispatcher::spawn(Arc::clone(&store), &config.notifications);
        let ledger = Self::new(
            store,
            notifications,
            config.ledger.clone(),
            config.accrual.clone(),
        );
        (ledger, worker)
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// The notification queue.
    #[must_use]
    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }

    /// Credits `amount` to the target account.
    ///
    /// # Errors
    ///
    /// Authorization errors, `InvalidArgument` for a missing target or a
    /// non-positive amount, `AccountNotFound`, or an internal failure.
    pub async fn deposit(
        &self,
        caller: Option<&str>,
        input: DepositInput,
    ) -> Result<DepositReceipt, LedgerError> {
        let admin = authorize_admin(self.store.as_ref(), caller).await?;
        let target = input
            .target_user_id
            .as_deref()
            .and_then(UserId::parse)
            .ok_or_else(|| LedgerError::invalid(INVALID_DEPOSIT))?;
        let amount = validate_amount(input.amount, INVALID_DEPOSIT)?;

        let receipt = self
            .commit_with_retry("deposit", || self.plan_deposit(&admin, &target, amount))
            .await?;

        info!(
            admin = %admin.id(),
            user_id = %receipt.user_id,
            amount = %amount,
            balance_after = %receipt.balance_after,
            "Deposit committed"
        );
        self.notifications
            .enqueue(Notification::deposit_credit(receipt.user_id.clone(), amount));

        Ok(receipt)
    }

    async fn plan_deposit(
        &self,
        admin: &AdminIdentity,
        target: &UserId,
        amount: Decimal,
    ) -> Result<(CommitUnit, DepositReceipt), LedgerError> {
        let row = self
            .store
            .account(target)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(target.clone()))?;

        let balance_after = checked_money_add(row.value.account_balance, amount)
            .ok_or_else(|| LedgerError::BalanceLimit(target.clone()))?;
        let record = LedgerRecord::admin_deposit(&row.value, amount, admin.id().clone(), balance_after);
        let receipt = DepositReceipt {
            transaction_id: record.id,
            user_id: target.clone(),
            amount,
            balance_after,
        };
        let unit = CommitUnit::new()
            .with_account(row.value.with_balance(balance_after), row.version)
            .with_record(record);

        Ok((unit, receipt))
    }

    /// Approves a pending withdrawal and debits the requester.
    ///
    /// # Errors
    ///
    /// Authorization errors, `InvalidArgument` for missing fields, and
    /// precondition failures if the withdrawal is not pending, does not match
    /// the supplied user and amount, or the balance is short.
    pub async fn approve_withdrawal(
        &self,
        caller: Option<&str>,
        input: ApproveWithdrawalInput,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        let admin = authorize_admin(self.store.as_ref(), caller).await?;
        let withdrawal_id = input
            .withdrawal_id
            .as_deref()
            .and_then(WithdrawalId::parse)
            .ok_or_else(|| LedgerError::invalid(INVALID_REQUEST))?;
        let user_id = input
            .user_id
            .as_deref()
            .and_then(UserId::parse)
            .ok_or_else(|| LedgerError::invalid(INVALID_REQUEST))?;
        let amount = validate_amount(input.amount, INVALID_REQUEST)?;

        let receipt = self
            .commit_with_retry("approve_withdrawal", || {
                self.plan_approval(&admin, &withdrawal_id, &user_id, amount)
            })
            .await?;

        info!(
            admin = %admin.id(),
            withdrawal_id = %withdrawal_id,
            user_id = %user_id,
            amount = %amount,
            "Withdrawal approved"
        );
        self.notifications
            .enqueue(Notification::withdrawal_approved(user_id, amount));

        Ok(receipt)
    }

    async fn plan_approval(
        &self,
        admin: &AdminIdentity,
        withdrawal_id: &WithdrawalId,
        user_id: &UserId,
        amount: Decimal,
    ) -> Result<(CommitUnit, WithdrawalReceipt), LedgerError> {
        let withdrawal = self
            .store
            .withdrawal(withdrawal_id)
            .await?
            .ok_or_else(|| LedgerError::WithdrawalNotPending(withdrawal_id.clone()))?;
        let action = WithdrawalWorkflow::approve(withdrawal.value.status, admin.id().clone())?;

        if &withdrawal.value.user_id != user_id || withdrawal.value.amount != amount {
            warn!(
                withdrawal_id = %withdrawal_id,
                stored_user = %withdrawal.value.user_id,
                stored_amount = %withdrawal.value.amount,
                "Approval does not match stored withdrawal"
            );
            return Err(LedgerError::WithdrawalMismatch(withdrawal_id.clone()));
        }

        let account = self
            .store
            .account(user_id)
            .await?
            .ok_or_else(|| LedgerError::WithdrawalAccountMissing(user_id.clone()))?;

        let balance = account.value.account_balance;
        if balance < amount {
            debug!(
                withdrawal_id = %withdrawal_id,
                detail = %describe_shortfall(balance, amount),
                "Approval refused"
            );
            return Err(LedgerError::InsufficientFunds { balance, amount });
        }

        let balance_after = balance - amount;
        let processed = action.apply(&withdrawal.value);
        let receipt = WithdrawalReceipt {
            withdrawal_id: withdrawal_id.clone(),
            user_id: user_id.clone(),
            amount,
            status: processed.status,
            balance_after: Some(balance_after),
        };
        let unit = CommitUnit::new()
            .with_account(account.value.with_balance(balance_after), account.version)
            .with_withdrawal(processed, withdrawal.version);

        Ok((unit, receipt))
    }

    /// Rejects a pending withdrawal. Balances are not touched.
    ///
    /// # Errors
    ///
    /// Authorization errors, `InvalidArgument` for a missing id, or a
    /// precondition failure if the withdrawal is not pending.
    pub async fn reject_withdrawal(
        &self,
        caller: Option<&str>,
        input: RejectWithdrawalInput,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        let admin = authorize_admin(self.store.as_ref(), caller).await?;
        let withdrawal_id = input
            .withdrawal_id
            .as_deref()
            .and_then(WithdrawalId::parse)
            .ok_or_else(|| LedgerError::invalid(INVALID_REQUEST))?;

        let receipt = self
            .commit_with_retry("reject_withdrawal", || {
                self.plan_rejection(&admin, &withdrawal_id)
            })
            .await?;

        info!(
            admin = %admin.id(),
            withdrawal_id = %withdrawal_id,
            user_id = %receipt.user_id,
            "Withdrawal rejected"
        );
        self.notifications
            .enqueue(Notification::withdrawal_rejected(receipt.user_id.clone()));

        Ok(receipt)
    }

    async fn plan_rejection(
        &self,
        admin: &AdminIdentity,
        withdrawal_id: &WithdrawalId,
    ) -> Result<(CommitUnit, WithdrawalReceipt), LedgerError> {
        let withdrawal = self
            .store
            .withdrawal(withdrawal_id)
            .await?
            .ok_or_else(|| LedgerError::WithdrawalNotPending(withdrawal_id.clone()))?;
        let action = WithdrawalWorkflow::reject(withdrawal.value.status, admin.id().clone())?;

        let processed = action.apply(&withdrawal.value);
        let receipt = WithdrawalReceipt {
            withdrawal_id: withdrawal_id.clone(),
            user_id: processed.user_id.clone(),
            amount: processed.amount,
            status: processed.status,
            balance_after: None,
        };
        let unit = CommitUnit::new().with_withdrawal(processed, withdrawal.version);

        Ok((unit, receipt))
    }

    /// Runs the daily accrual for `run_date` (UTC today if absent).
    ///
    /// This entry point is for the scheduler and performs no authorization.
    ///
    /// # Errors
    ///
    /// `InvalidRate`, a snapshot read failure, or `AccrualIncomplete`.
    pub async fn run_accrual(
        &self,
        run_date: Option<NaiveDate>,
    ) -> Result<AccrualReport, LedgerError> {
        let run_date = run_date.unwrap_or_else(|| Utc::now().date_naive());
        let job = AccrualJob::new(
            Arc::clone(&self.store),
            self.accrual.daily_rate,
            self.config.accrual_batch_size,
            self.config.max_commit_retries,
        );

        let report = job.run(run_date).await?;
        if report.processed > 0 {
            self.notifications.enqueue(Notification::accrual_summary(
                report.run_date,
                report.processed,
                report.total_credited,
            ));
        }
        Ok(report)
    }

    /// Runs the daily accrual on an administrator's request.
    ///
    /// # Errors
    ///
    /// Authorization errors, then as [`Self::run_accrual`].
    pub async fn run_accrual_as_admin(
        &self,
        caller: Option<&str>,
        run_date: Option<NaiveDate>,
    ) -> Result<AccrualReport, LedgerError> {
        let admin = authorize_admin(self.store.as_ref(), caller).await?;
        info!(admin = %admin.id(), "Manual accrual run requested");
        self.run_accrual(run_date).await
    }

    /// Aggregate figures and the latest activity.
    ///
    /// # Errors
    ///
    /// Authorization errors or a store failure.
    pub async fn overview(&self, caller: Option<&str>) -> Result<Overview, LedgerError> {
        authorize_admin(self.store.as_ref(), caller).await?;
        let limit = self.config.overview_limit;

        let (summary, accounts, withdrawals, transactions, notifications) = tokio::try_join!(
            self.store.ledger_summary(),
            self.store.list_accounts(limit),
            self.store.recent_withdrawals(limit),
            self.store.recent_records(limit),
            self.store.recent_notifications(limit),
        )?;

        Ok(Overview {
            summary,
            accounts,
            withdrawals,
            transactions,
            notifications,
        })
    }

    /// Replays one account's history and compares it with the stored balance.
    ///
    /// # Errors
    ///
    /// Authorization errors, `InvalidArgument`, `AccountNotFound`, or a store failure.
    pub async fn reconcile(
        &self,
        caller: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Reconciliation, LedgerError> {
        authorize_admin(self.store.as_ref(), caller).await?;
        let user_id = user_id
            .and_then(UserId::parse)
            .ok_or_else(|| LedgerError::invalid("Invalid user ID."))?;

        let account = self
            .store
            .account(&user_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(user_id.clone()))?;
        let (records, withdrawals) = tokio::try_join!(
            self.store.records_for_user(&user_id),
            self.store.withdrawals_for_user(&user_id),
        )?;

        let result = replay(&account.value, &records, &withdrawals);
        if !result.balanced {
            warn!(
                user_id = %user_id,
                stored = %result.stored_balance,
                replayed = %result.replayed_balance,
                "Account does not reconcile"
            );
        }
        Ok(result)
    }

    /// Runs `plan` and commits its unit, re-planning from fresh reads on conflict.
    async fn commit_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut plan: F,
    ) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(CommitUnit, T), LedgerError>>,
    {
        let attempts = self.config.max_commit_retries + 1;
        for attempt in 1..=attempts {
            let (unit, value) = plan().await?;
            match self.store.commit(unit).await {
                Ok(()) => return Ok(value),
                Err(e) if e.is_conflict() => {
                    debug!(operation, attempt, error = %e, "Commit conflict, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    warn!(operation, error = %e, "Commit failed");
                    return Err(e.into());
                }
            }
        }

        warn!(operation, attempts, "Giving up after repeated commit conflicts");
        Err(LedgerError::ConcurrentModification { attempts })
    }
}
