//! Logging system configuration and initialization
//!
//! - One log file per process run: `<prefix>_<YYYYmmdd_HHMMSS>.log`
//! - Console and file output, optional JSON for the file layer
//! - Local wall-clock timestamps
//! - `RUST_LOG` overrides the configured level
//!
//! The file writer's guard is handed back to the caller, who must keep it
//! alive for as long as logs should be flushed.

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const TIMER_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Dependency targets held down unless TRACE is requested
const QUIET_DIRECTIVES: &[&str] = &[
    "sqlx::query=warn",
    "sqlx::sqlite=warn",
    "reqwest=info",
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "html5ever=warn",
    "selectors=warn",
];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// File name for a run started at `started`
pub fn log_file_name(prefix: &str, started: chrono::DateTime<Local>) -> String {
    format!("{prefix}_{}.log", started.format("%Y%m%d_%H%M%S"))
}

fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {level}"))?;
    if !level.to_lowercase().contains("trace") {
        for directive in QUIET_DIRECTIVES {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    Ok(filter)
}

/// Initialize the global subscriber.
///
/// Returns the file writer guard when file output is enabled.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;
    let mut log_path: Option<PathBuf> = None;

    if config.file_output {
        let (layer, file_guard, path) = file_layer(config)?;
        layers.push(layer);
        guard = Some(file_guard);
        log_path = Some(path);
    }

    if config.console_output {
        layers.push(
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
                .with_target(false)
                .boxed(),
        );
    }

    if layers.is_empty() {
        return Err(anyhow!("No logging output configured"));
    }

    Registry::default()
        .with(layers)
        .with(build_env_filter(&config.level)?)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if let Some(path) = &log_path {
        info!("Log file: {}", path.display());
    }
    if !config.level.to_lowercase().contains("trace") {
        info!("Dependency logs suppressed (use TRACE level to see all logs)");
    }

    Ok(guard)
}

fn file_layer(config: &LoggingConfig) -> Result<(BoxedLayer, WorkerGuard, PathBuf)> {
    let log_dir: &Path = &config.directory;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_name = log_file_name(&config.file_prefix, Local::now());
    let path = log_dir.join(&file_name);
    let (writer, guard) = non_blocking(rolling::never(log_dir, file_name));

    let layer: BoxedLayer = if config.json_format {
        fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
            .with_target(true)
            .with_ansi(false)
            .boxed()
    } else {
        // time + level + message only
        fmt::Layer::new()
            .with_writer(writer)
            .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
            .with_target(false)
            .with_ansi(false)
            .boxed()
    };

    Ok((layer, guard, path))
}

/// Log build and environment information for diagnostics
pub fn log_system_info() {
    info!("=== Stock Check ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {}", current_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_is_timestamped() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name("stock_check", started), "stock_check_20240309_070501.log");
    }

    #[test]
    fn test_quiet_directives_parse() {
        let filter = build_env_filter("info");
        assert!(filter.is_ok());
    }

    #[test]
    fn test_no_output_is_an_error() {
        let config = LoggingConfig { console_output: false, file_output: false, ..LoggingConfig::default() };
        assert!(init_logging(&config).is_err());
    }
}
