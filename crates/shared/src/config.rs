//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger core tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Scheduled accrual settings.
    #[serde(default)]
    pub accrual: AccrualConfig,
    /// Notification delivery settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL. `memory://` selects the in-process store.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

impl DatabaseConfig {
    /// Returns true if the URL selects the in-process store.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("memory:")
    }
}

/// Ledger core tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// How many times a conflicting commit is re-read and retried.
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
    /// Accounts committed together in one accrual batch.
    #[serde(default = "default_accrual_batch_size")]
    pub accrual_batch_size: usize,
    /// Row cap for each list in the admin overview.
    #[serde(default = "default_overview_limit")]
    pub overview_limit: u64,
}

fn default_max_commit_retries() -> u32 {
    8
}

fn default_accrual_batch_size() -> usize {
    250 // two writes per account keeps a batch under 500 writes
}

fn default_overview_limit() -> u64 {
    50
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: default_max_commit_retries(),
            accrual_batch_size: default_accrual_batch_size(),
            overview_limit: default_overview_limit(),
        }
    }
}

/// Scheduled accrual settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualConfig {
    /// Fraction of the balance credited per run (0.015 = 1.5%).
    #[serde(default = "default_daily_rate")]
    pub daily_rate: Decimal,
}

/// Decimal places a stored rate keeps: the `rate` column is `NUMERIC(12, 6)`.
pub const RATE_SCALE: u32 = 6;

fn default_daily_rate() -> Decimal {
    Decimal::new(15, 3)
}

impl AccrualConfig {
    /// Checks that the rate is positive and stores without rounding.
    ///
    /// # Errors
    ///
    /// Returns a message describing the unusable rate.
    pub fn validate(&self) -> Result<(), String> {
        let rate = self.daily_rate;
        if rate <= Decimal::ZERO {
            return Err(format!("accrual.daily_rate must be positive, got {rate}"));
        }
        if rate.normalize().scale() > RATE_SCALE {
            return Err(format!(
                "accrual.daily_rate allows at most {RATE_SCALE} decimal places, got {rate}"
            ));
        }
        Ok(())
    }
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            daily_rate: default_daily_rate(),
        }
    }
}

/// Notification delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Capacity of the in-process delivery queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Insert attempts per notification before it is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the accrual rate
    /// is unusable.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LEDGERDESK").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config
            .accrual
            .validate()
            .map_err(config::ConfigError::Message)?;
        Ok(config)
    }
}
