//! Configuration infrastructure
//!
//! `AppConfig` is assembled by the `config` crate from an optional file
//! (TOML, JSON or YAML, detected by extension) layered under
//! `STOCKCHECK__`-prefixed environment variables, e.g.
//! `STOCKCHECK__SCHEDULER__CYCLE_INTERVAL_SECONDS=3600`. Every field has a
//! default, so an empty source yields a working configuration.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid CSS selector {selector:?} in {field}: {reason}")]
    InvalidSelector { field: &'static str, selector: String, reason: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub scraping: ScrapingConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file, created on first use
    pub path: PathBuf,

    /// How long SQLite itself waits on a locked database before reporting busy
    pub busy_timeout_seconds: u64,

    pub lock_retry: LockRetryConfig,
}

/// Storage-level retry for lock contention, separate from URL retry passes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockRetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Extra passes over skipped URLs after the first pass
    pub max_retry_passes: u32,

    /// Pause before each retry pass
    pub retry_pass_delay_ms: u64,

    pub selectors: SelectorConfig,
}

/// CSS selectors describing the storefront product page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Any match marks the product out of stock
    pub out_of_stock: Vec<String>,

    /// Any match marks the product purchasable
    pub add_to_cart: Vec<String>,

    pub title: String,
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cycle_interval_seconds: u64,
    pub error_backoff_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Directory holding one log file per process run
    pub directory: PathBuf,

    /// Log files are named `<file_prefix>_<YYYYmmdd_HHMMSS>.log`
    pub file_prefix: String,

    pub console_output: bool,
    pub file_output: bool,

    /// Enable JSON formatted file logs
    pub json_format: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DATABASE_PATH),
            busy_timeout_seconds: defaults::BUSY_TIMEOUT_SECONDS,
            lock_retry: LockRetryConfig::default(),
        }
    }
}

impl Default for LockRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::LOCK_RETRY_MAX_ATTEMPTS,
            base_delay_ms: defaults::LOCK_RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::LOCK_RETRY_MAX_DELAY_MS,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            follow_redirects: true,
        }
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_retry_passes: defaults::MAX_RETRY_PASSES,
            retry_pass_delay_ms: defaults::RETRY_PASS_DELAY_MS,
            selectors: SelectorConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            out_of_stock: defaults::OUT_OF_STOCK_SELECTORS.iter().map(ToString::to_string).collect(),
            add_to_cart: defaults::ADD_TO_CART_SELECTORS.iter().map(ToString::to_string).collect(),
            title: defaults::TITLE_SELECTOR.to_string(),
            price: defaults::PRICE_SELECTOR.to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_seconds: defaults::CYCLE_INTERVAL_SECONDS,
            error_backoff_seconds: defaults::ERROR_BACKOFF_SECONDS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            directory: PathBuf::from(defaults::LOG_DIRECTORY),
            file_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            console_output: true,
            file_output: true,
            json_format: false,
        }
    }
}

impl HttpConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl SchedulerConfig {
    pub const fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_seconds)
    }

    pub const fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_seconds)
    }
}

impl ScrapingConfig {
    pub const fn retry_pass_delay(&self) -> Duration {
        Duration::from_millis(self.retry_pass_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment.
    ///
    /// A missing file given explicitly is an error; without a path only the
    /// environment and the defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(defaults::ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::Invalid { field, reason: "must be greater than zero".to_string() });
            }
            Ok(())
        }

        positive("http.timeout_seconds", self.http.timeout_seconds)?;
        positive("database.lock_retry.max_attempts", u64::from(self.database.lock_retry.max_attempts))?;
        positive("database.lock_retry.base_delay_ms", self.database.lock_retry.base_delay_ms)?;
        positive("scheduler.cycle_interval_seconds", self.scheduler.cycle_interval_seconds)?;
        positive("scheduler.error_backoff_seconds", self.scheduler.error_backoff_seconds)?;

        if self.database.lock_retry.max_delay_ms < self.database.lock_retry.base_delay_ms {
            return Err(ConfigError::Invalid {
                field: "database.lock_retry.max_delay_ms",
                reason: "must not be smaller than base_delay_ms".to_string(),
            });
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "http.user_agent", reason: "must not be empty".to_string() });
        }
        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::Invalid {
                field: "logging",
                reason: "at least one of console_output and file_output must be enabled".to_string(),
            });
        }

        self.scraping.selectors.validate()
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.out_of_stock.is_empty() {
            return Err(ConfigError::Invalid {
                field: "scraping.selectors.out_of_stock",
                reason: "at least one selector is required".to_string(),
            });
        }

        let all = self
            .out_of_stock
            .iter()
            .map(|s| ("scraping.selectors.out_of_stock", s))
            .chain(self.add_to_cart.iter().map(|s| ("scraping.selectors.add_to_cart", s)))
            .chain([("scraping.selectors.title", &self.title), ("scraping.selectors.price", &self.price)]);

        for (field, selector) in all {
            Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
                field,
                selector: selector.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const ENV_PREFIX: &str = "STOCKCHECK";

    pub const DATABASE_PATH: &str = "stockcheck.db";
    pub const BUSY_TIMEOUT_SECONDS: u64 = 20;

    pub const LOCK_RETRY_MAX_ATTEMPTS: u32 = 5;
    pub const LOCK_RETRY_BASE_DELAY_MS: u64 = 1_000;
    pub const LOCK_RETRY_MAX_DELAY_MS: u64 = 30_000;

    /// Desktop Chrome; the storefronts serve a reduced page to unknown agents
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 5;

    pub const MAX_RETRY_PASSES: u32 = 2;
    pub const RETRY_PASS_DELAY_MS: u64 = 0;

    pub const OUT_OF_STOCK_SELECTORS: &[&str] = &[
        r#"button.js-btn_out-of-stock[title="Niet op voorraad"]"#,
        r#"button.js-btn_out-of-stock[title="Stock épuisé"]"#,
    ];
    pub const ADD_TO_CART_SELECTORS: &[&str] = &[
        r#"button[title="Ajouter au panier"]"#,
        r#"button[title="Toevoegen aan winkelmandje"]"#,
    ];
    pub const TITLE_SELECTOR: &str = "h1.js-product-title.js-make-bold";
    pub const PRICE_SELECTOR: &str = r#"div[data-testing-id="current-price"]"#;

    /// 24 hours
    pub const CYCLE_INTERVAL_SECONDS: u64 = 86_400;
    /// 1 hour
    pub const ERROR_BACKOFF_SECONDS: u64 = 3_600;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIRECTORY: &str = "logs";
    pub const LOG_FILE_PREFIX: &str = "stock_check";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scraping.max_retry_passes, 2);
        assert_eq!(config.http.timeout(), Duration::from_secs(5));
        assert_eq!(config.scheduler.cycle_interval(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.scheduler.error_backoff(), Duration::from_secs(60 * 60));
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[scheduler]\ncycle_interval_seconds = 600\n\n[database]\npath = \"custom.db\"")?;

        let config = AppConfig::load(Some(file.path()))?;

        assert_eq!(config.scheduler.cycle_interval_seconds, 600);
        assert_eq!(config.scheduler.error_backoff_seconds, defaults::ERROR_BACKOFF_SECONDS);
        assert_eq!(config.database.path, PathBuf::from("custom.db"));
        assert_eq!(config.database.lock_retry.max_attempts, defaults::LOCK_RETRY_MAX_ATTEMPTS);
        Ok(())
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.http.timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "http.timeout_seconds", .. })));
    }

    #[test]
    fn test_bad_selector_is_rejected() {
        let mut config = AppConfig::default();
        config.scraping.selectors.price = "div[".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSelector { .. })));
    }
}
