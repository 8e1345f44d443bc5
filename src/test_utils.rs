//! Test utilities for the stock-check pipeline
//!
//! An in-memory `PageFetcher`, a product page builder and a database
//! helper, so tests run without network access or shared state.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use crate::infrastructure::config::{DatabaseConfig, LockRetryConfig};
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::http_client::{FetchError, PageFetcher};

/// Page fetcher serving canned responses per URL.
///
/// Responses queued for a URL are consumed in order; the last one is
/// repeated. Unknown URLs answer HTTP 404.
#[derive(Default)]
pub struct StaticPageFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(self, url: &str, html: String) -> Self {
        self.with_responses(url, vec![Ok(html)])
    }

    #[must_use]
    pub fn with_responses(self, url: &str, responses: Vec<Result<String, FetchError>>) -> Self {
        if let Ok(mut map) = self.responses.lock() {
            map.entry(url.to_string()).or_default().extend(responses);
        }
        self
    }

    /// Every URL requested so far, in request order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }

        let not_found = || FetchError::HttpStatus { url: url.to_string(), status: 404 };
        let Ok(mut map) = self.responses.lock() else {
            return Err(not_found());
        };
        let Some(queue) = map.get_mut(url) else {
            return Err(not_found());
        };

        match queue.len() {
            0 => Err(not_found()),
            1 => queue.front().cloned().unwrap_or_else(|| Err(not_found())),
            _ => queue.pop_front().unwrap_or_else(|| Err(not_found())),
        }
    }
}

/// Minimal storefront product page.
///
/// `out_of_stock_title` adds the out-of-stock button with that title;
/// without it the page carries a Dutch add-to-cart button instead.
pub fn product_page(title: &str, out_of_stock_title: Option<&str>, price: Option<&str>) -> String {
    let marker = match out_of_stock_title {
        Some(label) => format!(r#"<button class="btn js-btn_out-of-stock" title="{label}">{label}</button>"#),
        None => r#"<button class="btn" title="Toevoegen aan winkelmandje">In winkelmandje</button>"#.to_string(),
    };
    let price = price
        .map(|p| format!(r#"<div class="price" data-testing-id="current-price">{p}</div>"#))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>{title}</title></head>
  <body>
    <h1 class="js-product-title js-make-bold">{title}</h1>
    {price}
    {marker}
  </body>
</html>"#
    )
}

/// Migrated SQLite database inside `dir` (usually a `tempfile::TempDir`).
///
/// Busy timeout is zero and lock retries are short so contention tests
/// finish quickly.
pub async fn database_in(dir: &Path) -> Result<DatabaseConnection> {
    let config = DatabaseConfig {
        path: dir.join("stockcheck-test.db"),
        busy_timeout_seconds: 0,
        lock_retry: LockRetryConfig { max_attempts: 3, base_delay_ms: 10, max_delay_ms: 50 },
    };
    Ok(DatabaseConnection::open(&config).await?)
}
