//! Per-account accrual arithmetic.

use chrono::NaiveDate;
use ledgerdesk_shared::types::{checked_money_add, round_money};
use rust_decimal::Decimal;
use tracing::warn;

use crate::ledger::types::{Account, LedgerRecord};

/// What an accrual run should do with one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualPlan {
    /// Credit the account: new state and its paired record.
    Credit {
        /// Account with balance, ROI total, and accrual date updated.
        account: Account,
        /// The `roi_accrual` record.
        record: LedgerRecord,
    },
    /// Already accrued on or after the run date.
    AlreadyAccrued,
    /// Nothing to credit: balance not positive, the amount rounds to zero,
    /// or the credit would push the balance past its limit.
    Skip,
}

/// Interest for one day, rounded to cents with banker's rounding.
#[must_use]
pub fn compute_accrual(balance: Decimal, rate: Decimal) -> Decimal {
    round_money(balance * rate)
}

/// Decides the accrual for `account` on `run_date`.
#[must_use]
pub fn plan_accrual(account: &Account, rate: Decimal, run_date: NaiveDate) -> AccrualPlan {
    if account
        .last_accrual_on
        .is_some_and(|last| last >= run_date)
    {
        return AccrualPlan::AlreadyAccrued;
    }
    if account.account_balance <= Decimal::ZERO {
        return AccrualPlan::Skip;
    }

    let Some(roi) = account.account_balance.checked_mul(rate).map(round_money) else {
        warn!(user_id = %account.id, %rate, "Accrual overflowed, account skipped");
        return AccrualPlan::Skip;
    };
    if roi <= Decimal::ZERO {
        return AccrualPlan::Skip;
    }

    let (Some(balance_after), Some(total_roi_earned)) = (
        checked_money_add(account.account_balance, roi),
        checked_money_add(account.total_roi_earned, roi),
    ) else {
        warn!(user_id = %account.id, %roi, "Accrual would exceed the balance limit, account skipped");
        return AccrualPlan::Skip;
    };
    let record = LedgerRecord::roi_accrual(
        account.id.clone(),
        roi,
        account.account_balance,
        balance_after,
        rate,
    );
    let mut updated = account.clone().with_balance(balance_after);
    updated.total_roi_earned = total_roi_earned;
    updated.last_accrual_on = Some(run_date);

    AccrualPlan::Credit {
        account: updated,
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdesk_shared::types::{MAX_MONEY, UserId};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn account(balance: Decimal) -> Account {
        Account::new(UserId::parse("u1").unwrap(), None).with_balance(balance)
    }

    #[test]
    fn test_compute_accrual_rounds_half_even() {
        assert_eq!(compute_accrual(dec!(100), dec!(0.015)), dec!(1.50));
        assert_eq!(compute_accrual(dec!(250), dec!(0.015)), dec!(3.75));
        // 0.125 and 0.135 sit exactly on the midpoint.
        assert_eq!(compute_accrual(dec!(12.5), dec!(0.01)), dec!(0.12));
        assert_eq!(compute_accrual(dec!(13.5), dec!(0.01)), dec!(0.14));
    }

    #[test]
    fn test_plan_credits_positive_balance() {
        let plan = plan_accrual(&account(dec!(250)), dec!(0.015), day(3));
        let AccrualPlan::Credit { account, record } = plan else {
            panic!("expected credit");
        };
        assert_eq!(account.account_balance, dec!(253.75));
        assert_eq!(account.total_roi_earned, dec!(3.75));
        assert_eq!(account.last_accrual_on, Some(day(3)));
        assert_eq!(record.balance_before, dec!(250));
        assert_eq!(record.rate, Some(dec!(0.015)));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_plan_respects_last_accrual_date() {
        let mut acct = account(dec!(100));
        acct.last_accrual_on = Some(day(3));
        assert_eq!(plan_accrual(&acct, dec!(0.015), day(3)), AccrualPlan::AlreadyAccrued);
        assert_eq!(plan_accrual(&acct, dec!(0.015), day(2)), AccrualPlan::AlreadyAccrued);
        assert!(matches!(
            plan_accrual(&acct, dec!(0.015), day(4)),
            AccrualPlan::Credit { .. }
        ));
    }

    #[test]
    fn test_plan_skips_credit_past_balance_limit() {
        assert_eq!(
            plan_accrual(&account(MAX_MONEY - dec!(1)), dec!(0.015), day(1)),
            AccrualPlan::Skip
        );
        assert_eq!(plan_accrual(&account(Decimal::MAX), dec!(2), day(1)), AccrualPlan::Skip);
    }

    #[test]
    fn test_plan_skips_zero_and_dust() {
        assert_eq!(plan_accrual(&account(dec!(0)), dec!(0.015), day(1)), AccrualPlan::Skip);
        assert_eq!(plan_accrual(&account(dec!(0.10)), dec!(0.015), day(1)), AccrualPlan::Skip);
    }
}
