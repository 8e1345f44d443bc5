//! Bounded retry passes over skipped URLs
//!
//! The first pass covers every URL of a category. Each retry pass covers
//! exactly the URLs the previous pass skipped, with the SKUs already seen
//! carried over. With `max_retry_passes = N` a URL is attempted at most
//! `N + 1` times.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::application::batch_processor::BatchProcessor;
use crate::domain::observation::Observation;
use crate::domain::product_url::ProductUrl;

/// Everything one category produced after all passes
#[derive(Debug, Clone, Default)]
pub struct CategoryOutcome {
    /// Out-of-stock observations first, then in-stock, each in resolution order
    pub observations: Vec<Observation>,
    pub out_of_stock: usize,
    pub in_stock: usize,
    /// URLs still skipped after the last pass
    pub permanently_skipped: Vec<String>,
    pub unidentified: Vec<String>,
    pub duplicates: usize,
    pub passes: u32,
}

#[derive(Clone)]
pub struct RetryCoordinator {
    processor: BatchProcessor,
    max_retry_passes: u32,
    pass_delay: Duration,
}

impl RetryCoordinator {
    pub const fn new(processor: BatchProcessor, max_retry_passes: u32, pass_delay: Duration) -> Self {
        Self { processor, max_retry_passes, pass_delay }
    }

    pub async fn run(&self, urls: Vec<ProductUrl>) -> CategoryOutcome {
        let mut seen = HashSet::new();
        let mut out_of_stock = Vec::new();
        let mut in_stock = Vec::new();
        let mut result = CategoryOutcome::default();
        let mut pending = urls;

        loop {
            if result.passes > 0 {
                info!("Retry pass {}/{} for {} skipped URLs", result.passes, self.max_retry_passes, pending.len());
                if !self.pass_delay.is_zero() {
                    sleep(self.pass_delay).await;
                }
            }

            let batch = self.processor.process(&pending, &mut seen).await;
            result.passes += 1;
            result.duplicates += batch.duplicates;
            result.unidentified.extend(batch.unidentified);
            out_of_stock.extend(batch.out_of_stock);
            in_stock.extend(batch.in_stock);
            pending = batch.skipped.into_iter().map(|(url, _)| url).collect();

            if pending.is_empty() || result.passes > self.max_retry_passes {
                break;
            }
        }

        for product_url in &pending {
            warn!("Skipping permanently after {} attempts: {}", result.passes, product_url.url);
        }

        result.out_of_stock = out_of_stock.len();
        result.in_stock = in_stock.len();
        result.permanently_skipped = pending.into_iter().map(String::from).collect();
        result.observations = out_of_stock;
        result.observations.extend(in_stock);
        result
    }
}
