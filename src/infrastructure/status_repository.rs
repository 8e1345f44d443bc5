//! Read models over the status and price history
//!
//! Reporting queries only; nothing here writes.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, Row};

use crate::domain::category::{Brand, Country};
use crate::domain::constants::formats::DATE_FORMAT;
use crate::domain::observation::{StockStatus, format_timestamp, now_to_second, parse_timestamp};
use crate::domain::price::Price;
use crate::domain::stock_history::{self, OutOfStockPeriod, OutOfStockSince, StatusPoint};
use crate::infrastructure::database_connection::{DatabaseConnection, StorageError, contains_pattern};

/// Latest status row for a product in one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub sku: String,
    pub product_name: String,
    pub country: String,
    pub brand: String,
    pub date: NaiveDateTime,
    pub status: StockStatus,
    pub product_type: String,
    pub current_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRecord {
    pub sku: String,
    pub country: String,
    pub price: Price,
    pub entry_date: NaiveDateTime,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceChange {
    pub sku: String,
    pub product_name: String,
    /// `None` for a first recorded price
    pub old_price: Option<Price>,
    pub new_price: Price,
    pub entry_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub sku: String,
    pub product_name: String,
}

#[derive(Clone)]
pub struct SqliteStatusRepository {
    db: DatabaseConnection,
}

impl SqliteStatusRepository {
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn current_status(&self, sku: &str, country: Country) -> Result<Option<StatusRecord>, StorageError> {
        let mut conn = self.db.connect().await?;
        let row = sqlx::query(
            r"
            SELECT p.SKU, p.ProductName, c.CountryCode, b.BrandName, s.Date, s.Status, s.Type, s.CurrentPrice
            FROM ProductStatus s
            JOIN Products p ON p.ProductID = s.ProductID
            JOIN Countries c ON c.CountryID = s.CountryID
            JOIN Brands b ON b.BrandID = s.BrandID
            WHERE p.SKU = ? AND c.CountryCode = ?
            ORDER BY s.Date DESC, s.StatusID DESC
            LIMIT 1
            ",
        )
        .bind(sku)
        .bind(country.code())
        .fetch_optional(&mut conn)
        .await?;
        conn.close().await?;

        row.map(|row| -> Result<StatusRecord, StorageError> {
            Ok(StatusRecord {
                sku: row.try_get("SKU")?,
                product_name: row.try_get("ProductName")?,
                country: row.try_get("CountryCode")?,
                brand: row.try_get("BrandName")?,
                date: timestamp_column(&row, "Date")?,
                status: status_column(&row, "Status")?,
                product_type: row.try_get("Type")?,
                current_price: row.try_get("CurrentPrice")?,
            })
        })
        .transpose()
    }

    /// Products whose latest status is OUT, longest outage first
    pub async fn currently_out_of_stock(&self, country: Country, brand: Brand) -> Result<Vec<OutOfStockSince>, StorageError> {
        let points = self.status_points(country, brand).await?;
        Ok(stock_history::currently_out_of_stock(&points, now_to_second()))
    }

    pub async fn out_of_stock_periods(&self, country: Country, brand: Brand) -> Result<Vec<OutOfStockPeriod>, StorageError> {
        let points = self.status_points(country, brand).await?;
        Ok(stock_history::out_of_stock_periods(&points, now_to_second()))
    }

    async fn status_points(&self, country: Country, brand: Brand) -> Result<Vec<StatusPoint>, StorageError> {
        let mut conn = self.db.connect().await?;
        let rows = sqlx::query(
            r"
            SELECT p.SKU, s.Date, s.Status
            FROM ProductStatus s
            JOIN Products p ON p.ProductID = s.ProductID
            JOIN Countries c ON c.CountryID = s.CountryID
            JOIN Brands b ON b.BrandID = s.BrandID
            WHERE c.CountryCode = ? AND b.BrandName = ?
            ORDER BY p.SKU, s.Date, s.StatusID
            ",
        )
        .bind(country.code())
        .bind(brand.name())
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<StatusPoint, StorageError> {
                Ok(StatusPoint {
                    sku: row.try_get("SKU")?,
                    date: timestamp_column(row, "Date")?,
                    status: status_column(row, "Status")?,
                })
            })
            .collect()
    }

    /// Price ledger for a SKU, newest first, optionally limited to one
    /// country and to the last `days` days
    pub async fn price_history(
        &self,
        sku: &str,
        country: Option<Country>,
        days: Option<u32>,
    ) -> Result<Vec<PriceRecord>, StorageError> {
        let since = days.map(|d| format_timestamp(&(now_to_second() - ChronoDuration::days(i64::from(d)))));

        let mut conn = self.db.connect().await?;
        let rows = sqlx::query(
            r"
            SELECT p.SKU, c.CountryCode, pr.Price, pr.EntryDate, pr.Reason
            FROM Prices pr
            JOIN Products p ON p.ProductID = pr.ProductID
            JOIN Countries c ON c.CountryID = pr.CountryID
            WHERE p.SKU = ?
              AND (? IS NULL OR c.CountryCode = ?)
              AND (? IS NULL OR pr.EntryDate >= ?)
            ORDER BY pr.EntryDate DESC, pr.PriceID DESC
            ",
        )
        .bind(sku)
        .bind(country.map(Country::code))
        .bind(country.map(Country::code))
        .bind(since.as_deref())
        .bind(since.as_deref())
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<PriceRecord, StorageError> {
                Ok(PriceRecord {
                    sku: row.try_get("SKU")?,
                    country: row.try_get("CountryCode")?,
                    price: Price::from_f64(row.try_get("Price")?),
                    entry_date: timestamp_column(row, "EntryDate")?,
                    reason: row.try_get("Reason")?,
                })
            })
            .collect()
    }

    /// Price rows entered on `date` in `country`, with the price they replaced
    pub async fn price_changes_on(&self, date: NaiveDate, country: Country) -> Result<Vec<PriceChange>, StorageError> {
        let day = date.format(DATE_FORMAT).to_string();

        let mut conn = self.db.connect().await?;
        let rows = sqlx::query(
            r"
            SELECT p.SKU, p.ProductName, pr.Price, pr.EntryDate,
                (SELECT older.Price FROM Prices older
                 WHERE older.ProductID = pr.ProductID
                   AND older.CountryID = pr.CountryID
                   AND (older.EntryDate < pr.EntryDate
                        OR (older.EntryDate = pr.EntryDate AND older.PriceID < pr.PriceID))
                 ORDER BY older.EntryDate DESC, older.PriceID DESC
                 LIMIT 1) AS OldPrice
            FROM Prices pr
            JOIN Products p ON p.ProductID = pr.ProductID
            JOIN Countries c ON c.CountryID = pr.CountryID
            WHERE c.CountryCode = ? AND substr(pr.EntryDate, 1, 10) = ?
            ORDER BY pr.EntryDate, pr.PriceID
            ",
        )
        .bind(country.code())
        .bind(day)
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<PriceChange, StorageError> {
                let old_price: Option<f64> = row.try_get("OldPrice")?;
                Ok(PriceChange {
                    sku: row.try_get("SKU")?,
                    product_name: row.try_get("ProductName")?,
                    old_price: old_price.map(Price::from_f64),
                    new_price: Price::from_f64(row.try_get("Price")?),
                    entry_date: timestamp_column(row, "EntryDate")?,
                })
            })
            .collect()
    }

    pub async fn search_skus(&self, term: &str) -> Result<Vec<ProductSummary>, StorageError> {
        let mut conn = self.db.connect().await?;
        let rows = sqlx::query(r"SELECT SKU, ProductName FROM Products WHERE SKU LIKE ? ESCAPE '\' ORDER BY SKU")
            .bind(contains_pattern(term))
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<ProductSummary, StorageError> {
                Ok(ProductSummary { sku: row.try_get("SKU")?, product_name: row.try_get("ProductName")? })
            })
            .collect()
    }
}

fn timestamp_column(row: &SqliteRow, column: &str) -> Result<NaiveDateTime, StorageError> {
    let text: String = row.try_get(column)?;
    parse_timestamp(&text).map_err(|e| StorageError::InvalidData(format!("{column} {text:?}: {e}")))
}

fn status_column(row: &SqliteRow, column: &str) -> Result<StockStatus, StorageError> {
    let text: String = row.try_get(column)?;
    text.parse().map_err(StorageError::InvalidData)
}
