// Database connection management
// Connections are opened per logical operation and closed afterwards; no
// pool is held across a cycle.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::infrastructure::config::DatabaseConfig;
use crate::infrastructure::retry_policy::LockRetryPolicy;

/// SQLite primary result codes for contention
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{operation} failed after {attempts} attempts on a locked database: {last_error}")]
    LockExhausted { operation: String, attempts: u32, last_error: Box<StorageError> },

    #[error("missing {entity} row for {key}")]
    MissingRow { entity: &'static str, key: String },

    #[error("invalid stored value: {0}")]
    InvalidData(String),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the failure is SQLite reporting a locked or busy database
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_error)) => {
                let primary_code = db_error.code().and_then(|code| code.parse::<i32>().ok()).map(|code| code & 0xff);
                if matches!(primary_code, Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                    return true;
                }
                let message = db_error.message().to_lowercase();
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS Countries (
        CountryID INTEGER PRIMARY KEY AUTOINCREMENT,
        CountryCode TEXT NOT NULL UNIQUE
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS Brands (
        BrandID INTEGER PRIMARY KEY AUTOINCREMENT,
        BrandName TEXT NOT NULL UNIQUE
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS Products (
        ProductID INTEGER PRIMARY KEY AUTOINCREMENT,
        SKU TEXT NOT NULL UNIQUE,
        ProductName TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS ProductStatus (
        StatusID INTEGER PRIMARY KEY AUTOINCREMENT,
        ProductID INTEGER NOT NULL REFERENCES Products (ProductID),
        CountryID INTEGER NOT NULL REFERENCES Countries (CountryID),
        BrandID INTEGER NOT NULL REFERENCES Brands (BrandID),
        Date TEXT NOT NULL,
        Status TEXT NOT NULL CHECK (Status IN ('IN', 'OUT')),
        Type TEXT NOT NULL,
        CurrentPrice TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS Prices (
        PriceID INTEGER PRIMARY KEY AUTOINCREMENT,
        ProductID INTEGER NOT NULL REFERENCES Products (ProductID),
        CountryID INTEGER NOT NULL REFERENCES Countries (CountryID),
        Price REAL NOT NULL,
        EntryDate TEXT NOT NULL,
        Reason TEXT NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_status_product_country_date ON ProductStatus (ProductID, CountryID, Date)",
    "CREATE INDEX IF NOT EXISTS idx_prices_product_country_date ON Prices (ProductID, CountryID, EntryDate)",
];

#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    path: PathBuf,
    options: SqliteConnectOptions,
    lock_retry: LockRetryPolicy,
}

impl DatabaseConnection {
    pub fn new(config: &DatabaseConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_seconds));

        Ok(Self {
            path: config.path.clone(),
            options,
            lock_retry: LockRetryPolicy::from_config(&config.lock_retry),
        })
    }

    /// Create the handle and make sure the schema exists
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let db = Self::new(config)?;
        db.migrate().await?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn lock_retry(&self) -> &LockRetryPolicy {
        &self.lock_retry
    }

    /// Open a fresh connection; callers close it when their operation ends.
    pub async fn connect(&self) -> Result<SqliteConnection, StorageError> {
        debug!("Opening SQLite connection to {}", self.path.display());
        Ok(self.options.connect().await?)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        self.lock_retry
            .run("schema migration", move || self.migrate_once())
            .await?;
        info!("Database schema ready at {}", self.path.display());
        Ok(())
    }

    async fn migrate_once(&self) -> Result<(), StorageError> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        conn.close().await?;
        Ok(())
    }
}

/// `LIKE` pattern matching `term` anywhere, with `%`, `_` and `\` taken
/// literally. Use together with `ESCAPE '\'`.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn config_for(path: PathBuf) -> DatabaseConfig {
        DatabaseConfig { path, ..DatabaseConfig::default() }
    }

    #[tokio::test]
    async fn test_database_migration() -> Result<()> {
        let temp_dir = tempdir()?;
        let db = DatabaseConnection::open(&config_for(temp_dir.path().join("nested").join("stock.db"))).await?;

        let mut conn = db.connect().await?;
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&mut conn)
                .await?;

        for table in ["Brands", "Countries", "Prices", "ProductStatus", "Products", "urls"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let config = config_for(temp_dir.path().join("stock.db"));

        DatabaseConnection::open(&config).await?;
        DatabaseConnection::open(&config).await?;
        Ok(())
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" zid1 "), "%zid1%");
        assert_eq!(contains_pattern("zid_1"), r"%zid\_1%");
        assert_eq!(contains_pattern(r"50%\"), r"%50\%\\%");
    }

    #[test]
    fn test_other_errors_are_not_contention() {
        assert!(!StorageError::MissingRow { entity: "Products", key: "1".to_string() }.is_lock_contention());
        assert!(!StorageError::Database(sqlx::Error::RowNotFound).is_lock_contention());
    }
}
