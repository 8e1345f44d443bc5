//! Stock Check - scheduled stock and price checker
//!
//! Visits a configured list of storefront product pages on a fixed schedule,
//! records whether each product is in stock together with its price, and
//! keeps an append-only history of status and price changes in SQLite.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

/// In-memory fakes shared by unit and integration tests
#[doc(hidden)]
pub mod test_utils;
