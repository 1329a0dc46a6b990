//! Configuration
//!
//! Settings shared by every command, read from CLI flags, the environment
//! and an optional `.env` file.

use std::{path::PathBuf, time::Duration};

use clap::Args;
use rusty_money::iso::Currency;

use crate::prices::{PriceError, currency_by_code};

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,
}

/// Store settings.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// Directory holding the cart, coupon and order documents
    #[arg(long, env = "TECHSTORE_DATA_DIR", default_value = ".techstore", global = true)]
    pub data_dir: PathBuf,

    /// ISO currency code the store trades in
    #[arg(long, env = "TECHSTORE_CURRENCY", default_value = "BRL", global = true)]
    pub currency: String,

    /// Product catalog fixture
    #[arg(long, env = "TECHSTORE_CATALOG", default_value = "fixtures/catalog.yml", global = true)]
    pub catalog: PathBuf,

    /// Simulated payment processing time in milliseconds
    #[arg(long, env = "TECHSTORE_PAYMENT_DELAY_MS", default_value_t = 2_000, global = true)]
    pub payment_delay_ms: u64,
}

impl StoreConfig {
    /// The configured currency.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::UnknownCurrency`] for an unsupported code.
    pub fn currency(&self) -> Result<&'static Currency, PriceError> {
        currency_by_code(&self.currency)
    }

    /// The simulated payment delay.
    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }
}

/// Load `.env` into the process environment if the file exists.
pub fn load_dotenv() {
    // Load .env file if present (ignore if missing)
    _ = dotenvy::dotenv();
}
