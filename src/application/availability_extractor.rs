//! Availability extraction for a single product URL

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::category::Brand;
use crate::domain::constants::formats::MISSING_PRICE;
use crate::domain::observation::{Observation, StockStatus, now_to_second};
use crate::domain::product_url::ProductUrl;
use crate::infrastructure::html_parser::{AvailabilityParser, PageVerdict};
use crate::infrastructure::http_client::{FetchError, PageFetcher};

/// Why a URL produced no observation this pass. Both cases are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Fetch(FetchError),
    UnrecognizedPage,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "{e}"),
            Self::UnrecognizedPage => f.write_str("page has no product title"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Observed(Observation),
    Skipped(SkipReason),
    /// The URL carries no `zid` product identifier; never retried
    Unidentified,
}

#[derive(Clone)]
pub struct AvailabilityExtractor {
    fetcher: Arc<dyn PageFetcher>,
    parser: AvailabilityParser,
}

impl AvailabilityExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, parser: AvailabilityParser) -> Self {
        Self { fetcher, parser }
    }

    pub async fn extract(&self, product_url: &ProductUrl) -> ExtractionOutcome {
        let Some(sku) = product_url.sku.clone() else {
            warn!("No zid product identifier in URL, ignoring: {}", product_url.url);
            return ExtractionOutcome::Unidentified;
        };

        let html = match self.fetcher.fetch_page(&product_url.url).await {
            Ok(html) => html,
            Err(e) => {
                debug!("Fetch failed for {}: {}", product_url.url, e);
                return ExtractionOutcome::Skipped(SkipReason::Fetch(e));
            }
        };

        let page = match self.parser.parse(&html) {
            PageVerdict::Product(page) => page,
            PageVerdict::Unrecognized => {
                debug!("Unrecognized page for {}", product_url.url);
                return ExtractionOutcome::Skipped(SkipReason::UnrecognizedPage);
            }
        };

        let status = if page.out_of_stock_marker {
            StockStatus::OutOfStock
        } else {
            if !page.add_to_cart_marker {
                warn!("Neither stock marker found for SKU {}, assuming in stock: {}", sku, product_url.url);
            }
            StockStatus::InStock
        };

        ExtractionOutcome::Observed(Observation {
            sku,
            product_type: Brand::from_title(&page.title),
            product_name: page.title,
            url: product_url.url.clone(),
            category: product_url.category,
            status,
            price_text: page.price_text.unwrap_or_else(|| MISSING_PRICE.to_string()),
            observed_at: now_to_second(),
        })
    }
}
