use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::category::Category;
use super::constants::sku::ZID_TOKEN;

static ZID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{ZID_TOKEN}([A-Za-z0-9_-]+)")).expect("zid pattern is a valid regex")
});

/// A storefront URL together with the category it belongs to and the SKU
/// encoded in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUrl {
    pub url: String,
    pub category: Category,
    /// Text following the `zid` token; `None` when the URL carries no token
    pub sku: Option<String>,
}

impl ProductUrl {
    /// Categorize a raw URL. Returns `None` when no storefront claims it.
    pub fn categorize(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let category = Category::from_url(&url)?;
        Some(Self::with_category(url, category))
    }

    pub fn with_category(url: impl Into<String>, category: Category) -> Self {
        let url = url.into();
        let sku = extract_sku(&url);
        Self { url, category, sku }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

/// Extract the product identifier following the last `zid` token.
pub fn extract_sku(url: &str) -> Option<String> {
    ZID_PATTERN
        .captures_iter(url)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl AsRef<str> for ProductUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl From<ProductUrl> for String {
    fn from(product_url: ProductUrl) -> Self {
        product_url.url
    }
}

impl fmt::Display for ProductUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.category)
    }
}
