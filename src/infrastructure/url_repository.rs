//! URL list storage (`urls` table)

use async_trait::async_trait;
use serde::Serialize;
use sqlx::Connection;
use tracing::{info, warn};
use url::Url;

use crate::domain::repositories::UrlSource;
use crate::infrastructure::database_connection::{DatabaseConnection, StorageError, contains_pattern};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddUrlsReport {
    pub added: usize,
    pub already_present: usize,
    /// Lines that are not absolute http(s) URLs
    pub rejected: Vec<String>,
}

#[derive(Clone)]
pub struct SqliteUrlRepository {
    db: DatabaseConnection,
}

impl SqliteUrlRepository {
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut conn = self.db.connect().await?;
        let urls = sqlx::query_scalar("SELECT url FROM urls ORDER BY id").fetch_all(&mut conn).await?;
        conn.close().await?;
        Ok(urls)
    }

    /// Add one URL per non-blank line, keeping existing ones untouched.
    pub async fn add_urls<I, S>(&self, lines: I) -> Result<AddUrlsReport, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = AddUrlsReport::default();
        let mut candidates = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            match Url::parse(line) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => candidates.push(line.to_string()),
                _ => {
                    warn!("Rejecting invalid URL: {}", line);
                    report.rejected.push(line.to_string());
                }
            }
        }

        if candidates.is_empty() {
            return Ok(report);
        }

        let candidates = &candidates;
        let added = self
            .db
            .lock_retry()
            .run("add urls", move || async move {
                let mut conn = self.db.connect().await?;
                let mut tx = conn.begin().await?;
                let mut added = 0;
                for url in candidates {
                    let result = sqlx::query("INSERT INTO urls (url) VALUES (?) ON CONFLICT (url) DO NOTHING")
                        .bind(url)
                        .execute(&mut *tx)
                        .await?;
                    added += usize::try_from(result.rows_affected()).unwrap_or(0);
                }
                tx.commit().await?;
                conn.close().await?;
                Ok::<_, StorageError>(added)
            })
            .await?;

        report.added = added;
        report.already_present = candidates.len() - added;
        info!("Added {} URLs ({} already present)", report.added, report.already_present);
        Ok(report)
    }

    pub async fn remove_url(&self, url: &str) -> Result<bool, StorageError> {
        let url = url.trim();
        let removed = self
            .db
            .lock_retry()
            .run("remove url", move || async move {
                let mut conn = self.db.connect().await?;
                let result = sqlx::query("DELETE FROM urls WHERE url = ?").bind(url).execute(&mut conn).await?;
                conn.close().await?;
                Ok::<_, StorageError>(result.rows_affected() > 0)
            })
            .await?;

        if removed {
            info!("Removed URL: {}", url);
        }
        Ok(removed)
    }

    /// URLs containing `term` (case-insensitive for ASCII)
    pub async fn search_urls(&self, term: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.db.connect().await?;
        let urls = sqlx::query_scalar(r"SELECT url FROM urls WHERE url LIKE ? ESCAPE '\' ORDER BY id")
            .bind(contains_pattern(term))
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;
        Ok(urls)
    }
}

#[async_trait]
impl UrlSource for SqliteUrlRepository {
    async fn list_urls(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.list().await?)
    }
}
