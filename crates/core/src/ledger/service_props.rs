//! Property-based tests for LedgerService.
//!
//! - Deposits: balance equals the sum credited, one consistent record each
//! - Invalid amounts never reach the store
//! - Accrual rounding never loses or invents a cent

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::DepositInput;
use super::types::Account;
use crate::accrual::compute_accrual;
use crate::store::{LedgerStore, MemoryStore};
use crate::testing::ledger_over;
use ledgerdesk_shared::types::UserId;

/// Strategy to generate positive amounts in whole cents (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate amounts a deposit must refuse.
fn invalid_amount() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(Decimal::ZERO),
        (1i64..1_000_000i64).prop_map(|cents| Decimal::new(-cents, 2)),
        // Sub-cent precision.
        (1i64..1_000_000i64)
            .prop_filter("not whole cents", |m| m % 10 != 0)
            .prop_map(|mills| Decimal::new(mills, 3)),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_account(Account::admin(UserId::parse("admin").unwrap(), None))
        .await;
    store
        .insert_account(Account::new(UserId::parse("u1").unwrap(), None))
        .await;
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Every deposit writes exactly one record whose delta is the amount,
    /// and the final balance is the sum of all deposits.
    #[test]
    fn prop_deposits_accumulate(amounts in prop::collection::vec(positive_amount(), 1..12)) {
        let (balance, records) = runtime().block_on(async {
            let store = seeded().await;
            let ledger = ledger_over(store.clone());
            for amount in &amounts {
                ledger
                    .deposit(Some("admin"), DepositInput {
                        target_user_id: Some("u1".into()),
                        amount: Some(*amount),
                    })
                    .await
                    .unwrap();
            }
            let account = store.account(&UserId::parse("u1").unwrap()).await.unwrap().unwrap();
            (account.value.account_balance, store.records().await)
        });

        let expected: Decimal = amounts.iter().copied().sum();
        prop_assert_eq!(balance, expected);
        prop_assert_eq!(records.len(), amounts.len());
        for (record, amount) in records.iter().zip(&amounts) {
            prop_assert_eq!(record.balance_after - record.balance_before, *amount);
        }
    }

    /// Zero, negative, and sub-cent amounts are rejected before any write.
    #[test]
    fn prop_invalid_amount_never_writes(amount in invalid_amount()) {
        let (is_invalid, records) = runtime().block_on(async {
            let store = seeded().await;
            let ledger = ledger_over(store.clone());
            let result = ledger
                .deposit(Some("admin"), DepositInput {
                    target_user_id: Some("u1".into()),
                    amount: Some(amount),
                })
                .await;
            let is_invalid = matches!(result, Err(super::error::LedgerError::InvalidArgument(_)));
            (is_invalid, store.records().await.len())
        });

        prop_assert!(is_invalid);
        prop_assert_eq!(records, 0);
    }

    /// The accrual is within half a cent of the exact product and has at most two decimals.
    #[test]
    fn prop_accrual_rounding_is_tight(balance in positive_amount(), rate_bp in 1i64..1_000i64) {
        let rate = Decimal::new(rate_bp, 4);
        let roi = compute_accrual(balance, rate);
        let exact = balance * rate;

        prop_assert!(roi.normalize().scale() <= 2);
        prop_assert!((roi - exact).abs() <= Decimal::new(5, 3));
        prop_assert!(roi >= Decimal::ZERO);
    }
}
