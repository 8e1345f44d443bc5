//! Product page parser
//!
//! Reads the availability markers, title and price off a storefront product
//! page. All selectors come from `SelectorConfig` and are compiled once.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::infrastructure::config::{ConfigError, SelectorConfig};

/// What a fetched page turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVerdict {
    Product(ProductPage),
    /// No product title: an error page, a captcha, or a changed layout
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub title: String,
    pub out_of_stock_marker: bool,
    pub add_to_cart_marker: bool,
    /// Trimmed price text, `None` when the price element is absent
    pub price_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AvailabilityParser {
    out_of_stock: Vec<Selector>,
    add_to_cart: Vec<Selector>,
    title: Selector,
    price: Selector,
}

impl AvailabilityParser {
    pub fn with_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            out_of_stock: compile_selectors("scraping.selectors.out_of_stock", &config.out_of_stock)?,
            add_to_cart: compile_selectors("scraping.selectors.add_to_cart", &config.add_to_cart)?,
            title: compile_selector("scraping.selectors.title", &config.title)?,
            price: compile_selector("scraping.selectors.price", &config.price)?,
        })
    }

    pub fn parse(&self, html: &str) -> PageVerdict {
        let document = Html::parse_document(html);

        let Some(title) = document.select(&self.title).next().map(element_text).filter(|t| !t.is_empty()) else {
            debug!("No product title found in page");
            return PageVerdict::Unrecognized;
        };

        let any_match = |selectors: &[Selector]| selectors.iter().any(|s| document.select(s).next().is_some());

        PageVerdict::Product(ProductPage {
            title,
            out_of_stock_marker: any_match(&self.out_of_stock),
            add_to_cart_marker: any_match(&self.add_to_cart),
            price_text: document.select(&self.price).next().map(element_text).filter(|t| !t.is_empty()),
        })
    }
}

/// Text nodes of an element, each trimmed, joined by single spaces
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn compile_selector(field: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        field,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn compile_selectors(field: &'static str, selectors: &[String]) -> Result<Vec<Selector>, ConfigError> {
    selectors.iter().map(|s| compile_selector(field, s)).collect()
}
