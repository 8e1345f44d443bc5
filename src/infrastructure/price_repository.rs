//! Manual price ledger corrections
//!
//! Entries made by hand from the command line. The scraping cycle never goes
//! through here; it only appends to `Prices` via the reconciliation store.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::Connection;
use tracing::info;

use crate::domain::category::Country;
use crate::domain::constants::formats::DATE_FORMAT;
use crate::domain::observation::format_timestamp;
use crate::domain::price::Price;
use crate::infrastructure::database_connection::{DatabaseConnection, StorageError};
use crate::infrastructure::reconciliation_repository::{ensure_country, ensure_product};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManualPriceWrite {
    Inserted,
    Updated,
}

#[derive(Clone)]
pub struct SqlitePriceRepository {
    db: DatabaseConnection,
}

impl SqlitePriceRepository {
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Set the price of `sku` in `country` for `entry_date`.
    ///
    /// Manual entries are stamped at midnight; an existing entry at that
    /// exact time is overwritten, anything else is a new ledger row. Unknown
    /// SKUs get a placeholder product name.
    pub async fn set_price(
        &self,
        sku: &str,
        country: Country,
        price: Price,
        entry_date: NaiveDate,
        reason: &str,
    ) -> Result<ManualPriceWrite, StorageError> {
        let sku = sku.trim();
        let reason = reason.trim();
        if sku.is_empty() {
            return Err(StorageError::InvalidData("SKU must not be empty".to_string()));
        }
        if reason.is_empty() {
            return Err(StorageError::InvalidData("price reason must not be empty".to_string()));
        }

        let entry_at = format_timestamp(&entry_date.and_time(NaiveTime::MIN));
        let entry_at = &entry_at;
        let placeholder_name = format!("Product {sku}");
        let placeholder_name = &placeholder_name;

        let write = self
            .db
            .lock_retry()
            .run("set price", move || async move {
                let mut conn = self.db.connect().await?;
                let mut tx = conn.begin().await?;

                let product_id = ensure_product(&mut *tx, sku, placeholder_name).await?;
                let country_id = ensure_country(&mut *tx, country.code()).await?;

                let updated = sqlx::query(
                    "UPDATE Prices SET Price = ?, Reason = ? WHERE ProductID = ? AND CountryID = ? AND EntryDate = ?",
                )
                .bind(price.as_f64())
                .bind(reason)
                .bind(product_id)
                .bind(country_id)
                .bind(entry_at)
                .execute(&mut *tx)
                .await?;

                let write = if updated.rows_affected() > 0 {
                    ManualPriceWrite::Updated
                } else {
                    sqlx::query("INSERT INTO Prices (ProductID, CountryID, Price, EntryDate, Reason) VALUES (?, ?, ?, ?, ?)")
                        .bind(product_id)
                        .bind(country_id)
                        .bind(price.as_f64())
                        .bind(entry_at)
                        .bind(reason)
                        .execute(&mut *tx)
                        .await?;
                    ManualPriceWrite::Inserted
                };

                tx.commit().await?;
                conn.close().await?;
                Ok::<_, StorageError>(write)
            })
            .await?;

        info!("Manual price {:?} for SKU {} in {} on {}: {} ({})", write, sku, country, entry_date, price, reason);
        Ok(write)
    }

    /// Delete every ledger row of `sku` in `country` entered on `entry_date`.
    /// Returns the number of rows removed.
    pub async fn delete_prices_on(&self, sku: &str, country: Country, entry_date: NaiveDate) -> Result<u64, StorageError> {
        let sku = sku.trim();
        let day = entry_date.format(DATE_FORMAT).to_string();
        let day = &day;

        let deleted = self
            .db
            .lock_retry()
            .run("delete prices", move || async move {
                let mut conn = self.db.connect().await?;
                let result = sqlx::query(
                    r"
                    DELETE FROM Prices
                    WHERE ProductID = (SELECT ProductID FROM Products WHERE SKU = ?)
                      AND CountryID = (SELECT CountryID FROM Countries WHERE CountryCode = ?)
                      AND substr(EntryDate, 1, 10) = ?
                    ",
                )
                .bind(sku)
                .bind(country.code())
                .bind(day)
                .execute(&mut conn)
                .await?;
                conn.close().await?;
                Ok::<_, StorageError>(result.rows_affected())
            })
            .await?;

        info!("Deleted {} price rows for SKU {} in {} on {}", deleted, sku, country, entry_date);
        Ok(deleted)
    }
}
