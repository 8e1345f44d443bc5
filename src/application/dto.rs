//! Data Transfer Objects for cycle reporting

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::category::Category;
use crate::domain::repositories::PersistReport;

/// Counts for one category within a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub urls: usize,
    pub out_of_stock: usize,
    pub in_stock: usize,
    pub skipped: usize,
    pub unidentified: usize,
    pub duplicates: usize,
    pub passes: u32,
    pub persisted: PersistReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub categories: Vec<CategoryReport>,
    /// URLs no storefront claimed
    pub uncategorized: usize,
}

impl CycleReport {
    pub fn total_observations(&self) -> usize {
        self.categories.iter().map(|c| c.out_of_stock + c.in_stock).sum()
    }

    pub fn total_out_of_stock(&self) -> usize {
        self.categories.iter().map(|c| c.out_of_stock).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.categories.iter().map(|c| c.skipped).sum()
    }

    pub fn persisted(&self) -> PersistReport {
        let mut total = PersistReport::default();
        for category in &self.categories {
            total.merge(category.persisted);
        }
        total
    }
}
