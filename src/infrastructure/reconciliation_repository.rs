//! Reconciliation store: writes observations into the dimensional schema
//!
//! Each `persist` call is one transaction. Per observation, in order:
//! get-or-create the country, brand and product rows, append the status fact,
//! then append a price row when the price differs from the last one recorded
//! for (product, country).

use async_trait::async_trait;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};

use crate::domain::observation::Observation;
use crate::domain::price::{Price, PriceReason};
use crate::domain::repositories::{ObservationSink, PersistReport};
use crate::infrastructure::database_connection::{DatabaseConnection, StorageError};

#[derive(Clone)]
pub struct SqliteObservationStore {
    db: DatabaseConnection,
}

/// Outcome of the price step for one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceStep {
    Recorded,
    Unchanged,
    Unparseable,
}

impl SqliteObservationStore {
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn persist_observations(&self, observations: &[Observation]) -> Result<PersistReport, StorageError> {
        if observations.is_empty() {
            return Ok(PersistReport::default());
        }

        let report = self
            .db
            .lock_retry()
            .run("persist observations", move || self.persist_once(observations))
            .await?;

        info!(
            "Persisted {} status rows ({} new prices, {} unchanged, {} unparseable)",
            report.status_rows, report.prices_recorded, report.prices_unchanged, report.price_parse_failures
        );
        Ok(report)
    }

    async fn persist_once(&self, observations: &[Observation]) -> Result<PersistReport, StorageError> {
        let mut conn = self.db.connect().await?;
        let mut tx = conn.begin().await?;
        let mut report = PersistReport::default();

        for observation in observations {
            match persist_observation(&mut *tx, observation).await? {
                PriceStep::Recorded => report.prices_recorded += 1,
                PriceStep::Unchanged => report.prices_unchanged += 1,
                PriceStep::Unparseable => report.price_parse_failures += 1,
            }
            report.status_rows += 1;
        }

        tx.commit().await?;
        conn.close().await?;
        Ok(report)
    }
}

#[async_trait]
impl ObservationSink for SqliteObservationStore {
    async fn persist(&self, observations: &[Observation]) -> anyhow::Result<PersistReport> {
        Ok(self.persist_observations(observations).await?)
    }
}

async fn persist_observation(conn: &mut SqliteConnection, observation: &Observation) -> Result<PriceStep, StorageError> {
    let country_code = observation.category.country.code();
    let brand_name = observation.category.brand.name();

    let country_id = ensure_country(conn, country_code).await?;
    let brand_id = ensure_brand(conn, brand_name).await?;
    let product_id = ensure_product(conn, &observation.sku, &observation.product_name).await?;

    let observed_at = observation.observed_at_text();
    sqlx::query(
        r"
        INSERT INTO ProductStatus (ProductID, CountryID, BrandID, Date, Status, Type, CurrentPrice)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(product_id)
    .bind(country_id)
    .bind(brand_id)
    .bind(&observed_at)
    .bind(observation.status.as_str())
    .bind(observation.product_type.name())
    .bind(&observation.price_text)
    .execute(&mut *conn)
    .await?;

    let price = match Price::parse(&observation.price_text) {
        Ok(price) => price,
        Err(e) => {
            warn!("Skipping price for SKU {} in {}: {}", observation.sku, country_code, e);
            return Ok(PriceStep::Unparseable);
        }
    };

    let last_price: Option<f64> = sqlx::query_scalar(
        r"
        SELECT Price FROM Prices
        WHERE ProductID = ? AND CountryID = ?
        ORDER BY EntryDate DESC, PriceID DESC
        LIMIT 1
        ",
    )
    .bind(product_id)
    .bind(country_id)
    .fetch_optional(&mut *conn)
    .await?;

    let reason = match last_price.map(Price::from_f64) {
        None => PriceReason::FirstRecorded,
        Some(last) if last != price => PriceReason::Changed,
        Some(_) => {
            debug!("Price unchanged for SKU {} in {}: {}", observation.sku, country_code, price);
            return Ok(PriceStep::Unchanged);
        }
    };

    sqlx::query("INSERT INTO Prices (ProductID, CountryID, Price, EntryDate, Reason) VALUES (?, ?, ?, ?, ?)")
        .bind(product_id)
        .bind(country_id)
        .bind(price.as_f64())
        .bind(&observed_at)
        .bind(reason.as_str())
        .execute(&mut *conn)
        .await?;

    info!("{} for SKU {} in {}: {}", reason, observation.sku, country_code, price);
    Ok(PriceStep::Recorded)
}

/// Get-or-create the `Countries` row for `code`
pub(crate) async fn ensure_country(conn: &mut SqliteConnection, code: &str) -> Result<i64, StorageError> {
    sqlx::query("INSERT INTO Countries (CountryCode) VALUES (?) ON CONFLICT (CountryCode) DO NOTHING")
        .bind(code)
        .execute(&mut *conn)
        .await?;
    lookup_id(conn, "SELECT CountryID FROM Countries WHERE CountryCode = ?", "Countries", code).await
}

async fn ensure_brand(conn: &mut SqliteConnection, name: &str) -> Result<i64, StorageError> {
    sqlx::query("INSERT INTO Brands (BrandName) VALUES (?) ON CONFLICT (BrandName) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    lookup_id(conn, "SELECT BrandID FROM Brands WHERE BrandName = ?", "Brands", name).await
}

/// Get-or-create the `Products` row for `sku`; `name` is only used on creation
pub(crate) async fn ensure_product(conn: &mut SqliteConnection, sku: &str, name: &str) -> Result<i64, StorageError> {
    sqlx::query("INSERT INTO Products (SKU, ProductName) VALUES (?, ?) ON CONFLICT (SKU) DO NOTHING")
        .bind(sku)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    lookup_id(conn, "SELECT ProductID FROM Products WHERE SKU = ?", "Products", sku).await
}

async fn lookup_id(
    conn: &mut SqliteConnection,
    sql: &'static str,
    entity: &'static str,
    key: &str,
) -> Result<i64, StorageError> {
    let id: Option<i64> = sqlx::query_scalar(sql).bind(key).fetch_optional(&mut *conn).await?;
    id.ok_or_else(|| StorageError::MissingRow { entity, key: key.to_string() })
}
