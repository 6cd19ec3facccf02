//! `SeaORM` entities.

pub mod accounts;
pub mod ledger_transactions;
pub mod notifications;
pub mod withdrawals;
