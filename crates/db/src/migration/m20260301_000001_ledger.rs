//! Ledger migration.
//!
//! Creates accounts, the append-only ledger_transactions table, and
//! withdrawals, plus the triggers that keep the audit trail immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(LEDGER_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(WITHDRAWALS_SQL).await?;
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
DROP TABLE IF EXISTS withdrawals CASCADE;
DROP TABLE IF EXISTS ledger_transactions CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP FUNCTION IF EXISTS prevent_ledger_mutation();
",
        )
        .await?;
        Ok(())
    }
}

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id VARCHAR(128) PRIMARY KEY,
    email TEXT,
    account_balance NUMERIC(20, 2) NOT NULL DEFAULT 0,
    total_roi_earned NUMERIC(20, 2) NOT NULL DEFAULT 0,
    is_admin BOOLEAN NOT NULL DEFAULT FALSE,
    last_accrual_on DATE,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_balance_non_negative CHECK (account_balance >= 0),
    CONSTRAINT chk_roi_non_negative CHECK (total_roi_earned >= 0)
);

-- Accrual snapshot scans only funded accounts
CREATE INDEX idx_accounts_funded ON accounts(id) WHERE account_balance > 0;
";

const LEDGER_TRANSACTIONS_SQL: &str = r"
CREATE TABLE ledger_transactions (
    id UUID PRIMARY KEY,
    user_id VARCHAR(128) NOT NULL REFERENCES accounts(id),
    amount NUMERIC(20, 2) NOT NULL,
    transaction_type VARCHAR(32) NOT NULL,
    processed_by VARCHAR(128),
    email TEXT,
    balance_before NUMERIC(20, 2) NOT NULL,
    balance_after NUMERIC(20, 2) NOT NULL,
    rate NUMERIC(12, 6),
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_transaction_type CHECK (transaction_type IN ('admin_deposit', 'roi_accrual')),
    CONSTRAINT chk_balance_delta CHECK (balance_after = balance_before + amount)
);

CREATE INDEX idx_ledger_transactions_user ON ledger_transactions(user_id, recorded_at);
CREATE INDEX idx_ledger_transactions_recorded ON ledger_transactions(recorded_at DESC);
";

const WITHDRAWALS_SQL: &str = r"
CREATE TABLE withdrawals (
    id VARCHAR(128) PRIMARY KEY,
    user_id VARCHAR(128) NOT NULL,
    amount NUMERIC(20, 2) NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'pending',
    requested_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    processed_by VARCHAR(128),
    processed_at TIMESTAMPTZ,
    version BIGINT NOT NULL DEFAULT 1,
    CONSTRAINT chk_withdrawal_amount CHECK (amount > 0),
    CONSTRAINT chk_withdrawal_status CHECK (status IN ('pending', 'approved', 'rejected'))
);

CREATE INDEX idx_withdrawals_user ON withdrawals(user_id);
CREATE INDEX idx_withdrawals_pending ON withdrawals(requested_at) WHERE status = 'pending';
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION prevent_ledger_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'ledger_transactions is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_transactions_append_only
    BEFORE UPDATE OR DELETE ON ledger_transactions
    FOR EACH ROW EXECUTE FUNCTION prevent_ledger_mutation();
";
