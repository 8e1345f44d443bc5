//! Scheduler loop
//!
//! Alternates between running a full cycle and sleeping. A successful cycle
//! is followed by the regular interval, a failed one by the shorter error
//! backoff. The loop never ends on its own.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::application::availability_extractor::AvailabilityExtractor;
use crate::application::batch_processor::BatchProcessor;
use crate::application::dto::{CategoryReport, CycleReport};
use crate::application::retry_coordinator::RetryCoordinator;
use crate::domain::category::group_urls_by_category;
use crate::domain::observation::now_to_second;
use crate::domain::product_url::ProductUrl;
use crate::domain::repositories::{ObservationSink, UrlSource};
use crate::infrastructure::config::{AppConfig, ConfigError, SchedulerConfig};
use crate::infrastructure::html_parser::AvailabilityParser;
use crate::infrastructure::http_client::PageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    RunningCycle,
    Sleeping(Duration),
}

pub struct Scheduler {
    urls: Arc<dyn UrlSource>,
    sink: Arc<dyn ObservationSink>,
    coordinator: RetryCoordinator,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        urls: Arc<dyn UrlSource>,
        sink: Arc<dyn ObservationSink>,
    ) -> Result<Self, ConfigError> {
        let parser = AvailabilityParser::with_config(&config.scraping.selectors)?;
        let processor = BatchProcessor::new(AvailabilityExtractor::new(fetcher, parser));
        let coordinator = RetryCoordinator::new(
            processor,
            config.scraping.max_retry_passes,
            config.scraping.retry_pass_delay(),
        );

        Ok(Self { urls, sink, coordinator, config: config.scheduler.clone() })
    }

    /// One full pass: load, categorize, extract with retries, persist per category.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = now_to_second();
        let urls = self.urls.list_urls().await.context("Failed to load URL list")?;
        info!("Starting stock check cycle for {} URLs", urls.len());

        let (groups, uncategorized) = group_urls_by_category(urls);
        for url in &uncategorized {
            warn!("URL matches no known storefront, ignoring: {}", url);
        }

        let mut categories = Vec::with_capacity(groups.len());
        for (category, category_urls) in groups {
            info!("Processing {} ({} URLs)", category, category_urls.len());
            let url_count = category_urls.len();
            let product_urls = category_urls
                .into_iter()
                .map(|url| ProductUrl::with_category(url, category))
                .collect();

            let outcome = self.coordinator.run(product_urls).await;
            let persisted = self
                .sink
                .persist(&outcome.observations)
                .await
                .with_context(|| format!("Failed to persist observations for {category}"))?;

            info!(
                "{}: {} out of stock, {} in stock, {} skipped",
                category,
                outcome.out_of_stock,
                outcome.in_stock,
                outcome.permanently_skipped.len()
            );

            categories.push(CategoryReport {
                category,
                urls: url_count,
                out_of_stock: outcome.out_of_stock,
                in_stock: outcome.in_stock,
                skipped: outcome.permanently_skipped.len(),
                unidentified: outcome.unidentified.len(),
                duplicates: outcome.duplicates,
                passes: outcome.passes,
                persisted,
            });
        }

        let report = CycleReport { started_at, finished_at: now_to_second(), categories, uncategorized: uncategorized.len() };
        info!(
            "Cycle finished: {} observations ({} out of stock), {} skipped",
            report.total_observations(),
            report.total_out_of_stock(),
            report.total_skipped()
        );
        Ok(report)
    }

    /// State that follows a finished cycle
    pub fn next_state(&self, result: &Result<CycleReport>) -> SchedulerState {
        match result {
            Ok(_) => SchedulerState::Sleeping(self.config.cycle_interval()),
            Err(_) => SchedulerState::Sleeping(self.config.error_backoff()),
        }
    }

    pub async fn run(&self) {
        let mut state = SchedulerState::RunningCycle;
        loop {
            state = match state {
                SchedulerState::RunningCycle => {
                    let result = self.run_cycle().await;
                    if let Err(e) = &result {
                        error!("Stock check cycle failed: {:#}", e);
                    }
                    self.next_state(&result)
                }
                SchedulerState::Sleeping(duration) => {
                    info!("Sleeping for {:?} until the next cycle", duration);
                    sleep(duration).await;
                    SchedulerState::RunningCycle
                }
            };
        }
    }
}
