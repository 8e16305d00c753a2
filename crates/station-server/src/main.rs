//! `station-server` -- runs one simulated manufacturing station.
//!
//! Usage:
//!   station-server [-c <config>] [--log-filter <directives>] [--log-format text|json]
//!
//! Without a configuration file the built-in defaults apply, with asset
//! paths relative to the working directory.

use anyhow::Context;
use clap::Parser;
use station_data::StationConfig;
use station_server::StationServer;
use station_server::logging::{self, LogFormat};
use std::path::PathBuf;
use tracing::info;

/// Simulated manufacturing station.
#[derive(Parser, Debug)]
#[command(name = "station-server", about = "Simulated manufacturing station")]
struct Cli {
    /// Configuration file (RON, TOML or JSON).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Log filter directives; overrides RUST_LOG.
    #[arg(long = "log-filter")]
    log_filter: Option<String>,

    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_filter.as_deref(), cli.log_format)
        .context("failed to initialise logging")?;

    let server = match &cli.config {
        Some(path) => {
            info!(config = %path.display(), "loading configuration");
            StationServer::from_config_file(path)
        }
        None => StationServer::build(StationConfig::default()),
    }
    .context("failed to start station")?;

    let clock = server.start();
    info!(
        station = %server.station().node(),
        cycle_time_ms = server.config().ideal_cycle_time_ms,
        clock_armed = server.config().start_clock,
        "station running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    server.station().clock().disarm();
    clock.abort();
    Ok(())
}
