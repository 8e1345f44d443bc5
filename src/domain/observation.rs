//! Observation entity: one scrape's status and price snapshot for a product

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::category::{Brand, Category};
use super::constants::formats::TIMESTAMP_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "IN")]
    InStock,
    #[serde(rename = "OUT")]
    OutOfStock,
}

impl StockStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "IN",
            Self::OutOfStock => "OUT",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Self::InStock),
            "OUT" => Ok(Self::OutOfStock),
            other => Err(format!("unknown stock status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub sku: String,
    pub product_name: String,
    pub url: String,
    pub category: Category,
    pub status: StockStatus,
    /// Product line derived from the title; may differ from `category.brand`
    pub product_type: Brand,
    /// Price text exactly as shown on the page, or `N/A`
    pub price_text: String,
    pub observed_at: NaiveDateTime,
}

impl Observation {
    pub fn is_in_stock(&self) -> bool {
        self.status == StockStatus::InStock
    }

    pub fn observed_at_text(&self) -> String {
        format_timestamp(&self.observed_at)
    }
}

/// Local wall-clock time truncated to whole seconds
pub fn now_to_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
}
