//! Database seeder for Ledgerdesk development and testing.
//!
//! Seeds a development administrator, two funded users, and one pending
//! withdrawal. Funds are credited through the ledger so every balance has
//! its audit record. Rows that already exist are left alone.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::{Context, bail};
use rust_decimal::Decimal;

use ledgerdesk_core::ledger::{Account, DepositInput, LedgerService};
use ledgerdesk_core::store::LedgerStore;
use ledgerdesk_core::workflow::WithdrawalRequest;
use ledgerdesk_db::{PgLedgerStore, connect};
use ledgerdesk_shared::AppConfig;
use ledgerdesk_shared::types::{UserId, WithdrawalId};

const DEV_ADMIN: &str = "dev-admin";
const DEV_USERS: [(&str, &str, i64); 2] = [
    ("dev-alice", "alice@ledgerdesk.dev", 50_000),
    ("dev-bob", "bob@ledgerdesk.dev", 25_000),
];
const DEV_WITHDRAWAL: &str = "dev-withdrawal-1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    if config.database.is_in_memory() {
        bail!("the seeder needs a PostgreSQL database url, not memory://");
    }

    println!("Connecting to database...");
    let db = connect(&config.database)
        .await
        .context("connecting to database")?;
    let store = Arc::new(PgLedgerStore::new(db));
    let (ledger, _worker) = LedgerService::from_config(store.clone(), &config);

    println!("Seeding administrator...");
    seed_account(&store, Account::admin(user_id(DEV_ADMIN)?, None)).await?;

    println!("Seeding users...");
    for (id, email, cents) in DEV_USERS {
        let created =
            seed_account(&store, Account::new(user_id(id)?, Some(email.to_string()))).await?;
        if created {
            let receipt = ledger
                .deposit(
                    Some(DEV_ADMIN),
                    DepositInput {
                        target_user_id: Some(id.to_string()),
                        amount: Some(Decimal::new(cents, 2)),
                    },
                )
                .await
                .with_context(|| format!("funding {id}"))?;
            println!("  {}", receipt.message());
        }
    }

    println!("Seeding pending withdrawal...");
    seed_withdrawal(&store).await?;

    ledger.notifications().flush().await;
    println!("Seeding complete!");
    Ok(())
}

fn user_id(raw: &str) -> anyhow::Result<UserId> {
    UserId::parse(raw).with_context(|| format!("invalid user id {raw:?}"))
}

/// Inserts `account` unless it exists. Returns true if it was created.
async fn seed_account(store: &PgLedgerStore, account: Account) -> anyhow::Result<bool> {
    if store.account(&account.id).await?.is_some() {
        println!("  {} already exists, skipping...", account.id);
        return Ok(false);
    }
    store.upsert_account(&account).await?;
    println!("  Created {}", account.id);
    Ok(true)
}

async fn seed_withdrawal(store: &PgLedgerStore) -> anyhow::Result<()> {
    let id = WithdrawalId::parse(DEV_WITHDRAWAL).context("invalid withdrawal id")?;
    if store.withdrawal(&id).await?.is_some() {
        println!("  {id} already exists, skipping...");
        return Ok(());
    }

    let request = WithdrawalRequest::pending(id, user_id(DEV_USERS[0].0)?, Decimal::new(10_000, 2));
    store.insert_withdrawal(&request).await?;
    println!("  Created {} for {}", request.id, request.user_id);
    Ok(())
}
