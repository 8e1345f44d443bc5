//! Stock history reconstruction from the append-only status log
//!
//! Status rows for a product are read in date order; these functions derive
//! the "out of stock since" date and the out-of-stock periods from them.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use super::observation::StockStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPoint {
    pub sku: String,
    pub date: NaiveDateTime,
    pub status: StockStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfStockSince {
    pub sku: String,
    pub since: NaiveDateTime,
    pub days_out_of_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfStockPeriod {
    pub sku: String,
    pub out_of_stock_at: NaiveDateTime,
    /// First IN observation after the period started; `None` while still out
    pub back_in_stock_at: Option<NaiveDateTime>,
    pub days_out_of_stock: i64,
}

impl OutOfStockPeriod {
    pub const fn is_current(&self) -> bool {
        self.back_in_stock_at.is_none()
    }
}

/// Earliest OUT in the unbroken trailing run of OUT statuses.
///
/// `points` must belong to one product and be ordered oldest first. Returns
/// `None` when the latest status is IN or there is no history.
pub fn out_of_stock_since(points: &[StatusPoint]) -> Option<NaiveDateTime> {
    points
        .iter()
        .rev()
        .take_while(|p| p.status == StockStatus::OutOfStock)
        .last()
        .map(|p| p.date)
}

/// Products whose latest status is OUT, longest outage first.
pub fn currently_out_of_stock(points: &[StatusPoint], now: NaiveDateTime) -> Vec<OutOfStockSince> {
    let mut current: Vec<OutOfStockSince> = group_by_sku(points)
        .into_iter()
        .filter_map(|(sku, history)| {
            let since = out_of_stock_since(&history)?;
            Some(OutOfStockSince {
                sku: sku.to_string(),
                since,
                days_out_of_stock: (now - since).num_days(),
            })
        })
        .collect();

    current.sort_by(|a, b| b.days_out_of_stock.cmp(&a.days_out_of_stock).then_with(|| a.sku.cmp(&b.sku)));
    current
}

/// Every IN -> OUT transition with the date the product came back.
///
/// Sorted by SKU, newest period first within a SKU.
pub fn out_of_stock_periods(points: &[StatusPoint], now: NaiveDateTime) -> Vec<OutOfStockPeriod> {
    let mut periods = Vec::new();

    for (sku, history) in group_by_sku(points) {
        let mut sku_periods = Vec::new();
        let mut previous: Option<StockStatus> = None;

        for (index, point) in history.iter().enumerate() {
            let starts_period = point.status == StockStatus::OutOfStock
                && previous.is_none_or(|status| status == StockStatus::InStock);

            if starts_period {
                let back_in_stock_at = history[index + 1..]
                    .iter()
                    .find(|p| p.status == StockStatus::InStock)
                    .map(|p| p.date);
                let until = back_in_stock_at.unwrap_or(now);
                sku_periods.push(OutOfStockPeriod {
                    sku: sku.to_string(),
                    out_of_stock_at: point.date,
                    back_in_stock_at,
                    days_out_of_stock: (until - point.date).num_days(),
                });
            }
            previous = Some(point.status);
        }

        sku_periods.reverse();
        periods.extend(sku_periods);
    }

    periods
}

fn group_by_sku(points: &[StatusPoint]) -> BTreeMap<&str, Vec<StatusPoint>> {
    let mut grouped: BTreeMap<&str, Vec<StatusPoint>> = BTreeMap::new();
    for point in points {
        grouped.entry(point.sku.as_str()).or_default().push(point.clone());
    }
    for history in grouped.values_mut() {
        history.sort_by_key(|p| p.date);
    }
    grouped
}
