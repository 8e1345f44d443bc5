//! Site characteristics and domain constants
//!
//! The monitored shops publish one storefront per country and brand. The
//! domain fragments below are what the categorizer matches on.

/// Storefront domain fragments, keyed by brand
pub mod storefronts {
    /// Ninja kitchen appliance storefront prefix (followed by the country TLD)
    pub const NINJA_DOMAIN: &str = "ninjakitchen";

    /// Shark cleaning appliance storefront prefix (followed by the country TLD)
    pub const SHARK_DOMAIN: &str = "sharkclean";
}

/// Product identification inside storefront URLs
pub mod sku {
    /// Token that precedes the product identifier, e.g. `.../zid123456`
    pub const ZID_TOKEN: &str = "zid";
}

/// Persisted value formats
pub mod formats {
    /// Timestamp format used for observation and price entry dates (second precision)
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Date-only format used by day-level queries
    pub const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Price text stored when the page has no price element
    pub const MISSING_PRICE: &str = "N/A";
}
