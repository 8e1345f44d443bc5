//! Batch processing of one category's URLs
//!
//! URLs are extracted strictly one after another. A SKU is kept the first
//! time it resolves to an observation; later URLs with an already-seen SKU
//! are dropped without fetching.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::application::availability_extractor::{AvailabilityExtractor, ExtractionOutcome, SkipReason};
use crate::domain::observation::Observation;
use crate::domain::product_url::ProductUrl;

/// Result of one pass over a list of URLs
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub out_of_stock: Vec<Observation>,
    pub in_stock: Vec<Observation>,
    /// Retry-eligible URLs with the reason each was skipped
    pub skipped: Vec<(ProductUrl, SkipReason)>,
    pub unidentified: Vec<String>,
    pub duplicates: usize,
}

impl BatchOutcome {
    pub fn observation_count(&self) -> usize {
        self.out_of_stock.len() + self.in_stock.len()
    }
}

#[derive(Clone)]
pub struct BatchProcessor {
    extractor: AvailabilityExtractor,
}

impl BatchProcessor {
    pub const fn new(extractor: AvailabilityExtractor) -> Self {
        Self { extractor }
    }

    /// Run one pass. `seen` carries SKUs resolved by earlier passes and is
    /// extended with the SKUs resolved here.
    pub async fn process(&self, urls: &[ProductUrl], seen: &mut HashSet<String>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for product_url in urls {
            if let Some(sku) = &product_url.sku {
                if seen.contains(sku) {
                    debug!("Duplicate SKU {} skipped: {}", sku, product_url.url);
                    outcome.duplicates += 1;
                    continue;
                }
            }

            match self.extractor.extract(product_url).await {
                ExtractionOutcome::Observed(observation) => {
                    seen.insert(observation.sku.clone());
                    info!("{} [{}] {}", observation.status, observation.sku, observation.product_name);
                    if observation.is_in_stock() {
                        outcome.in_stock.push(observation);
                    } else {
                        outcome.out_of_stock.push(observation);
                    }
                }
                ExtractionOutcome::Skipped(reason) => {
                    debug!("Skipped {}: {}", product_url.url, reason);
                    outcome.skipped.push((product_url.clone(), reason));
                }
                ExtractionOutcome::Unidentified => outcome.unidentified.push(product_url.url.clone()),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::SelectorConfig;
    use crate::infrastructure::html_parser::AvailabilityParser;
    use crate::test_utils::{StaticPageFetcher, product_page};
    use std::sync::Arc;

    fn processor(fetcher: Arc<StaticPageFetcher>) -> BatchProcessor {
        let parser = AvailabilityParser::with_config(&SelectorConfig::default()).unwrap();
        BatchProcessor::new(AvailabilityExtractor::new(fetcher, parser))
    }

    fn urls(raw: &[&str]) -> Vec<ProductUrl> {
        raw.iter().map(|u| ProductUrl::categorize(*u).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_sku_keeps_first_resolved() {
        let first = "https://www.sharkclean.nl/a/zid42";
        let second = "https://www.sharkclean.nl/b/zid42";
        let fetcher = Arc::new(
            StaticPageFetcher::new()
                .with_page(first, product_page("Shark First", None, Some("€ 10,00")))
                .with_page(second, product_page("Shark Second", None, Some("€ 20,00"))),
        );
        let mut seen = HashSet::new();

        let outcome = processor(fetcher.clone()).process(&urls(&[first, second]), &mut seen).await;

        assert_eq!(outcome.observation_count(), 1);
        assert_eq!(outcome.in_stock[0].product_name, "Shark First");
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(fetcher.call_count(second), 0);
        assert!(seen.contains("42"));
    }

    #[tokio::test]
    async fn test_failed_first_url_lets_duplicate_resolve() {
        let broken = "https://www.sharkclean.nl/a/zid7";
        let working = "https://www.sharkclean.nl/b/zid7";
        let fetcher =
            Arc::new(StaticPageFetcher::new().with_page(working, product_page("Shark Backup", Some("Niet op voorraad"), None)));
        let mut seen = HashSet::new();

        let outcome = processor(fetcher).process(&urls(&[broken, working]), &mut seen).await;

        assert_eq!(outcome.out_of_stock.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0.url, broken);
    }

    #[tokio::test]
    async fn test_urls_are_fetched_in_order() {
        let list = [
            "https://www.ninjakitchen.fr/zid1",
            "https://www.ninjakitchen.fr/zid2",
            "https://www.ninjakitchen.fr/zid3",
        ];
        let fetcher = Arc::new(list.iter().fold(StaticPageFetcher::new(), |f, u| {
            f.with_page(u, product_page("Ninja", Some("Stock épuisé"), Some("€ 99,99")))
        }));
        let mut seen = HashSet::new();

        let outcome = processor(fetcher.clone()).process(&urls(&list), &mut seen).await;

        assert_eq!(outcome.out_of_stock.len(), 3);
        assert_eq!(fetcher.calls(), list.iter().map(ToString::to_string).collect::<Vec<_>>());
    }
}
