//! Stock Check: scheduled stock and price checker for storefront product pages

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use stockcheck_lib::application::Scheduler;
use stockcheck_lib::domain::{Brand, Country, Price};
use stockcheck_lib::infrastructure::{
    AppConfig, DatabaseConnection, HttpClient, SqliteObservationStore, SqlitePriceRepository, SqliteStatusRepository,
    SqliteUrlRepository, init_logging, log_system_info,
};

#[derive(Parser)]
#[command(name = "stockcheck")]
#[command(about = "Scheduled stock and price checker for storefront product pages")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler loop until interrupted
    Run,

    /// Run exactly one cycle and exit
    Once,

    /// Manage the URL list
    Urls {
        #[command(subcommand)]
        command: UrlCommands,
    },

    /// Correct the price ledger by hand
    Prices {
        #[command(subcommand)]
        command: PriceCommands,
    },

    /// Query recorded stock and price history
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
enum UrlCommands {
    /// Add URLs given as arguments or one per line in a file
    Add {
        urls: Vec<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Remove one URL
    Remove { url: String },

    /// List URLs containing a term
    Search { term: String },

    /// List every URL
    List,
}

#[derive(Subcommand)]
enum PriceCommands {
    /// Record or overwrite a price for a date (defaults to today)
    Set {
        sku: String,
        country: Country,

        #[arg(value_parser = Price::parse)]
        price: Price,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, default_value = "Manual entry")]
        reason: String,
    },

    /// Delete the price rows of a SKU entered on a date
    Delete { sku: String, country: Country, date: NaiveDate },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Products currently out of stock, or every out-of-stock period
    OutOfStock {
        country: Country,
        brand: Brand,

        /// Show every out-of-stock period instead of the current ones
        #[arg(long)]
        periods: bool,
    },

    /// Price history of a SKU, newest first
    Prices {
        sku: String,

        #[arg(long)]
        country: Option<Country>,

        /// Only the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Price changes entered on a date (YYYY-MM-DD)
    Changes { date: NaiveDate, country: Country },

    /// Latest status of a SKU in a country
    Status { sku: String, country: Country },

    /// Find SKUs containing a term
    Skus { term: String },
}

impl Commands {
    const fn is_daemon(&self) -> bool {
        matches!(self, Self::Run | Self::Once)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Management commands print to stdout; keep their logs in the file only
    let mut logging = config.logging.clone();
    if !cli.command.is_daemon() {
        logging.console_output = false;
    }
    let _log_guard = if logging.console_output || logging.file_output {
        init_logging(&logging)?
    } else {
        None
    };
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    let db = DatabaseConnection::open(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;

    match cli.command {
        Commands::Run => {
            log_system_info();
            let scheduler = build_scheduler(&config, &db)?;
            tokio::select! {
                () = scheduler.run() => {}
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for shutdown signal")?;
                    info!("Shutdown requested, stopping scheduler");
                }
            }
            Ok(())
        }
        Commands::Once => {
            log_system_info();
            let report = build_scheduler(&config, &db)?.run_cycle().await?;
            print_json(&report)
        }
        Commands::Urls { command } => run_url_command(command, SqliteUrlRepository::new(db)).await,
        Commands::Prices { command } => run_price_command(command, SqlitePriceRepository::new(db)).await,
        Commands::Report { command } => run_report_command(command, SqliteStatusRepository::new(db)).await,
    }
}

fn build_scheduler(config: &AppConfig, db: &DatabaseConnection) -> Result<Scheduler> {
    let fetcher = Arc::new(HttpClient::with_config(&config.http)?);
    let urls = Arc::new(SqliteUrlRepository::new(db.clone()));
    let sink = Arc::new(SqliteObservationStore::new(db.clone()));
    Ok(Scheduler::new(config, fetcher, urls, sink)?)
}

async fn run_url_command(command: UrlCommands, repo: SqliteUrlRepository) -> Result<()> {
    match command {
        UrlCommands::Add { mut urls, file } => {
            if let Some(path) = file {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                urls.extend(content.lines().map(str::to_string));
            }
            let report = repo.add_urls(&urls).await?;
            print_json(&report)
        }
        UrlCommands::Remove { url } => {
            if repo.remove_url(&url).await? {
                println!("Removed {url}");
            } else {
                println!("Not found: {url}");
            }
            Ok(())
        }
        UrlCommands::Search { term } => print_lines(&repo.search_urls(&term).await?),
        UrlCommands::List => print_lines(&repo.list().await?),
    }
}

async fn run_price_command(command: PriceCommands, repo: SqlitePriceRepository) -> Result<()> {
    match command {
        PriceCommands::Set { sku, country, price, date, reason } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let write = repo.set_price(&sku, country, price, date, &reason).await?;
            print_json(&write)
        }
        PriceCommands::Delete { sku, country, date } => {
            let deleted = repo.delete_prices_on(&sku, country, date).await?;
            println!("Deleted {deleted} price rows");
            Ok(())
        }
    }
}

async fn run_report_command(command: ReportCommands, repo: SqliteStatusRepository) -> Result<()> {
    match command {
        ReportCommands::OutOfStock { country, brand, periods: false } => {
            print_json(&repo.currently_out_of_stock(country, brand).await?)
        }
        ReportCommands::OutOfStock { country, brand, periods: true } => {
            print_json(&repo.out_of_stock_periods(country, brand).await?)
        }
        ReportCommands::Prices { sku, country, days } => print_json(&repo.price_history(&sku, country, days).await?),
        ReportCommands::Changes { date, country } => print_json(&repo.price_changes_on(date, country).await?),
        ReportCommands::Status { sku, country } => print_json(&repo.current_status(&sku, country).await?),
        ReportCommands::Skus { term } => print_json(&repo.search_skus(&term).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) -> Result<()> {
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
