//! Infrastructure layer for database access, HTTP fetching, HTML parsing,
//! configuration and logging

pub mod config;
pub mod database_connection;
pub mod html_parser;
pub mod http_client;
pub mod logging;
pub mod price_repository;
pub mod reconciliation_repository;
pub mod retry_policy;
pub mod status_repository;
pub mod url_repository;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError};
pub use database_connection::{DatabaseConnection, StorageError};
pub use html_parser::{AvailabilityParser, PageVerdict, ProductPage};
pub use http_client::{FetchError, HttpClient, PageFetcher};
pub use logging::{init_logging, log_system_info};
pub use price_repository::{ManualPriceWrite, SqlitePriceRepository};
pub use reconciliation_repository::SqliteObservationStore;
pub use retry_policy::LockRetryPolicy;
pub use status_repository::SqliteStatusRepository;
pub use url_repository::{AddUrlsReport, SqliteUrlRepository};
