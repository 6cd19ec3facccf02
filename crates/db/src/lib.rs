//! PostgreSQL storage for Ledgerdesk.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Database migrations
//! - [`PgLedgerStore`], the production [`ledgerdesk_core::store::LedgerStore`]

pub mod entities;
pub mod migration;
pub mod store;

pub use store::{DbStoreError, PgLedgerStore};

use std::sync::Arc;
use std::time::Duration;

use ledgerdesk_core::store::{LedgerStore, MemoryStore};
use ledgerdesk_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

/// Establishes a pooled connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Opens the store selected by `config.url`.
///
/// `memory://` selects the in-process store, which starts empty and is lost on
/// exit. Any other URL is a PostgreSQL connection.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn LedgerStore>, DbErr> {
    if config.is_in_memory() {
        warn!("Using the in-memory ledger store; data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = connect(config).await?;
    info!(
        max_connections = config.max_connections,
        "Connected to database"
    );
    Ok(Arc::new(PgLedgerStore::new(db)))
}
