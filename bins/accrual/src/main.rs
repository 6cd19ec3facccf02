//! Daily ROI accrual, invoked by the scheduler.
//!
//! Usage:
//!   ledgerdesk-accrual                      - Accrue for today (UTC)
//!   ledgerdesk-accrual --date 2026-03-01    - Accrue for a given date
//!   ledgerdesk-accrual --rate 0.01          - Override the configured daily rate
//!
//! Re-running for a date that already completed credits nothing. A run that
//! stops part way exits non-zero; run it again to finish.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerdesk_core::ledger::LedgerService;
use ledgerdesk_db::open_store;
use ledgerdesk_shared::AppConfig;

/// Applies one day's interest to every funded account.
#[derive(Parser, Debug)]
#[command(name = "ledgerdesk-accrual")]
#[command(about = "Run the daily ROI accrual")]
struct Cli {
    /// Date to accrue for (YYYY-MM-DD); today in UTC if absent
    #[arg(long, env = "LEDGERDESK_ACCRUAL_DATE")]
    date: Option<NaiveDate>,

    /// Daily rate as a fraction (0.015 = 1.5%); overrides configuration
    #[arg(long)]
    rate: Option<Decimal>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerdesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(rate) = cli.rate {
        config.accrual.daily_rate = rate;
        config
            .accrual
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid --rate")?;
    }

    let store = open_store(&config.database)
        .await
        .context("opening ledger store")?;
    let (ledger, _worker) = LedgerService::from_config(store, &config);

    let outcome = ledger.run_accrual(cli.date).await;
    ledger.notifications().flush().await;

    let report = outcome.context("accrual run failed")?;
    info!(
        run_date = %report.run_date,
        processed = report.processed,
        already_accrued = report.already_accrued,
        skipped = report.skipped,
        total_credited = %report.total_credited,
        "{}",
        report.message()
    );

    Ok(())
}
