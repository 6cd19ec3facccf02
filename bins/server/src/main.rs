//! Ledgerdesk API Server
//!
//! Main entry point for the admin ledger service.

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerdesk_api::{AppState, create_router};
use ledgerdesk_core::ledger::LedgerService;
use ledgerdesk_db::open_store;
use ledgerdesk_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let store = open_store(&config.database).await?;
    let (ledger, _worker) = LedgerService::from_config(store, &config);
    info!(
        daily_rate = %config.accrual.daily_rate,
        max_commit_retries = config.ledger.max_commit_retries,
        "Ledger ready"
    );

    let state = AppState::new(ledger);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining notification queue");
    state.ledger.notifications().flush().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
