//! Manual price ledger correction tests
use anyhow::Result;
use chrono::NaiveDate;
use stockcheck_lib::domain::observation::parse_timestamp;
use stockcheck_lib::domain::{Brand, Category, Country, Observation, Price, StockStatus};
use stockcheck_lib::infrastructure::{
    ManualPriceWrite, SqliteObservationStore, SqlitePriceRepository, SqliteStatusRepository, StorageError,
};
use stockcheck_lib::test_utils::database_in;
use tempfile::tempdir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).expect("valid date")
}

#[tokio::test]
async fn set_price_inserts_then_overwrites_the_same_day() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let prices = SqlitePriceRepository::new(db.clone());

    let first = prices.set_price("777", Country::Spain, Price::from_cents(4_999), day(5), "Promo").await?;
    let second = prices.set_price("777", Country::Spain, Price::from_cents(3_999), day(5), "Promo fix").await?;
    let other_day = prices.set_price("777", Country::Spain, Price::from_cents(4_999), day(6), "Promo end").await?;

    assert_eq!(first, ManualPriceWrite::Inserted);
    assert_eq!(second, ManualPriceWrite::Updated);
    assert_eq!(other_day, ManualPriceWrite::Inserted);

    let status = SqliteStatusRepository::new(db);
    let history = status.price_history("777", Some(Country::Spain), None).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].price.cents(), 3_999);
    assert_eq!(history[1].reason, "Promo fix");
    assert_eq!(history[1].entry_date, parse_timestamp("2024-03-05 00:00:00")?);

    let products = status.search_skus("777").await?;
    assert_eq!(products[0].product_name, "Product 777");
    Ok(())
}

#[tokio::test]
async fn manual_entry_keeps_scraped_product_name() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    SqliteObservationStore::new(db.clone())
        .persist_observations(&[Observation {
            sku: "888".to_string(),
            product_name: "Shark Anti Hair Wrap".to_string(),
            url: "https://www.sharkclean.es/zid888".to_string(),
            category: Category::new(Country::Spain, Brand::Shark),
            status: StockStatus::InStock,
            product_type: Brand::Shark,
            price_text: "€ 299,00".to_string(),
            observed_at: parse_timestamp("2024-03-04 08:00:00")?,
        }])
        .await?;

    SqlitePriceRepository::new(db.clone())
        .set_price("888", Country::Spain, Price::from_cents(24_900), day(5), "Manual entry")
        .await?;

    let status = SqliteStatusRepository::new(db);
    assert_eq!(status.search_skus("888").await?[0].product_name, "Shark Anti Hair Wrap");
    let history = status.price_history("888", None, None).await?;
    assert_eq!(history.iter().map(|p| p.price.cents()).collect::<Vec<_>>(), vec![24_900, 29_900]);
    Ok(())
}

#[tokio::test]
async fn delete_removes_only_the_requested_day_and_country() -> Result<()> {
    let dir = tempdir()?;
    let db = database_in(dir.path()).await?;
    let prices = SqlitePriceRepository::new(db.clone());

    prices.set_price("999", Country::France, Price::from_cents(100), day(1), "Manual entry").await?;
    prices.set_price("999", Country::France, Price::from_cents(200), day(2), "Manual entry").await?;
    prices.set_price("999", Country::Belgium, Price::from_cents(100), day(1), "Manual entry").await?;

    assert_eq!(prices.delete_prices_on("999", Country::France, day(1)).await?, 1);
    assert_eq!(prices.delete_prices_on("999", Country::France, day(1)).await?, 0);
    assert_eq!(prices.delete_prices_on("unknown", Country::France, day(2)).await?, 0);

    let status = SqliteStatusRepository::new(db);
    assert_eq!(status.price_history("999", Some(Country::France), None).await?.len(), 1);
    assert_eq!(status.price_history("999", Some(Country::Belgium), None).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn blank_reason_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let prices = SqlitePriceRepository::new(database_in(dir.path()).await?);

    let result = prices.set_price("1", Country::France, Price::from_cents(100), day(1), "  ").await;

    assert!(matches!(result, Err(StorageError::InvalidData(_))));
    Ok(())
}
