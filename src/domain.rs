//! Domain module - Core business logic and entities
//!
//! This module contains the stock-check entities, value objects and the
//! pure rules that the pipeline applies to them (categorization, price
//! normalization, stock history reconstruction).

pub mod category;
pub mod constants;
pub mod observation;
pub mod price;
pub mod product_url;
pub mod repositories;
pub mod stock_history;

// Re-export commonly used items for convenience
pub use category::{Brand, Category, Country, group_urls_by_category};
pub use observation::{Observation, StockStatus};
pub use price::{Price, PriceParseError, PriceReason};
pub use product_url::ProductUrl;
pub use repositories::{ObservationSink, PersistReport, UrlSource};
