//! Repository interfaces for the stock-check pipeline
//!
//! The pipeline only needs two seams: where URLs come from and where
//! observations go. Both are implemented over SQLite in the infrastructure
//! layer and faked in tests.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use super::observation::Observation;

#[async_trait]
pub trait UrlSource: Send + Sync {
    /// Full configured URL list, in storage order.
    async fn list_urls(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Persist one category's observations in a single transaction.
    ///
    /// Either every status and price row is written or none is.
    async fn persist(&self, observations: &[Observation]) -> Result<PersistReport>;
}

/// Row counts written by one `ObservationSink::persist` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub status_rows: usize,
    pub prices_recorded: usize,
    pub prices_unchanged: usize,
    /// Observations whose price text could not be normalized; their status
    /// rows were still written
    pub price_parse_failures: usize,
}

impl PersistReport {
    pub fn merge(&mut self, other: Self) {
        self.status_rows += other.status_rows;
        self.prices_recorded += other.prices_recorded;
        self.prices_unchanged += other.prices_unchanged;
        self.price_parse_failures += other.price_parse_failures;
    }
}
