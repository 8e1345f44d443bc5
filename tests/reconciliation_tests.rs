//! Reconciliation store tests against a temporary SQLite database
use anyhow::Result;
use sqlx::Connection;
use stockcheck_lib::domain::observation::parse_timestamp;
use stockcheck_lib::domain::{Brand, Category, Country, Observation, StockStatus};
use stockcheck_lib::infrastructure::{DatabaseConnection, SqliteObservationStore, SqliteStatusRepository, StorageError};
use stockcheck_lib::test_utils::database_in;
use tempfile::tempdir;

fn observation(sku: &str, status: StockStatus, price: &str, at: &str) -> Observation {
    Observation {
        sku: sku.to_string(),
        product_name: format!("Shark Product {sku}"),
        url: format!("https://www.sharkclean.nl/p/zid{sku}"),
        category: Category::new(Country::Netherlands, Brand::Shark),
        status,
        product_type: Brand::Shark,
        price_text: price.to_string(),
        observed_at: parse_timestamp(at).unwrap(),
    }
}

async fn count(db: &DatabaseConnection, sql: &str) -> Result<i64> {
    let mut conn = db.connect().await?;
    let n: i64 = sqlx::query_scalar(sql).fetch_one(&mut conn).await?;
    conn.close().await?;
    Ok(n)
}

#[tokio::test]
async fn unchanged_price_is_recorded_once() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    let first = store
        .persist_observations(&[observation("100", StockStatus::InStock, "€ 129,99", "2024-03-01 08:00:00")])
        .await?;
    let second = store
        .persist_observations(&[observation("100", StockStatus::InStock, "€129.99", "2024-03-02 08:00:00")])
        .await?;

    assert_eq!(first.prices_recorded, 1);
    assert_eq!(second.prices_recorded, 0);
    assert_eq!(second.prices_unchanged, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM Prices").await?, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM ProductStatus").await?, 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM Products").await?, 1);
    Ok(())
}

#[tokio::test]
async fn changed_price_appends_a_second_row() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    store
        .persist_observations(&[observation("200", StockStatus::InStock, "€ 129,99", "2024-03-01 08:00:00")])
        .await?;
    store
        .persist_observations(&[observation("200", StockStatus::InStock, "€ 99,99", "2024-03-02 08:00:00")])
        .await?;

    let history = SqliteStatusRepository::new(db).price_history("200", Some(Country::Netherlands), None).await?;

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].price.cents(), 9_999);
    assert_eq!(history[0].reason, "New price recorded");
    assert_eq!(history[1].price.cents(), 12_999);
    assert_eq!(history[1].reason, "First recorded price");
    Ok(())
}

#[tokio::test]
async fn out_of_stock_observation_reads_back_as_current_status() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    store
        .persist_observations(&[
            observation("300", StockStatus::InStock, "€ 10,00", "2024-03-01 08:00:00"),
            observation("300", StockStatus::OutOfStock, "€ 10,00", "2024-03-02 08:00:00"),
        ])
        .await?;

    let status = SqliteStatusRepository::new(db).current_status("300", Country::Netherlands).await?;

    let status = status.expect("status row");
    assert_eq!(status.status, StockStatus::OutOfStock);
    assert_eq!(status.brand, "Shark");
    assert_eq!(status.product_type, "Shark");
    assert_eq!(status.current_price, "€ 10,00");
    Ok(())
}

#[tokio::test]
async fn unparseable_price_still_writes_the_status_row() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    let report = store
        .persist_observations(&[observation("400", StockStatus::OutOfStock, "N/A", "2024-03-01 08:00:00")])
        .await?;

    assert_eq!(report.status_rows, 1);
    assert_eq!(report.price_parse_failures, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM Prices").await?, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM ProductStatus WHERE CurrentPrice = 'N/A'").await?, 1);
    Ok(())
}

#[tokio::test]
async fn product_name_is_kept_from_first_sighting() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    let mut renamed = observation("500", StockStatus::InStock, "€ 1,00", "2024-03-02 08:00:00");
    renamed.product_name = "Renamed".to_string();
    store
        .persist_observations(&[observation("500", StockStatus::InStock, "€ 1,00", "2024-03-01 08:00:00"), renamed])
        .await?;

    let products = SqliteStatusRepository::new(db).search_skus("500").await?;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_name, "Shark Product 500");
    Ok(())
}

#[tokio::test]
async fn locked_database_is_retried_until_released() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    let mut blocker = db.connect().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut blocker).await?;

    let release = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(15)).await;
        sqlx::query("COMMIT").execute(&mut blocker).await?;
        blocker.close().await
    });

    let report = store
        .persist_observations(&[observation("600", StockStatus::InStock, "€ 5,00", "2024-03-01 08:00:00")])
        .await?;
    release.await??;

    assert_eq!(report.status_rows, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM ProductStatus").await?, 1);
    Ok(())
}

#[tokio::test]
async fn lock_that_never_clears_exhausts_the_retry_policy() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let store = SqliteObservationStore::new(db.clone());

    let mut blocker = db.connect().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut blocker).await?;

    let result = store
        .persist_observations(&[observation("700", StockStatus::InStock, "€ 5,00", "2024-03-01 08:00:00")])
        .await;

    assert!(matches!(result, Err(StorageError::LockExhausted { attempts: 3, .. })));

    sqlx::query("ROLLBACK").execute(&mut blocker).await?;
    assert_eq!(count(&db, "SELECT COUNT(*) FROM ProductStatus").await?, 0);
    Ok(())
}
