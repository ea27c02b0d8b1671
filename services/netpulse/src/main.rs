//! Netpulse CLI
//!
//! Command-line interface for the connectivity monitor and status banner service.

use std::path::PathBuf;

use clap::Parser;
use netpulse::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "netpulse")]
#[command(about = "Connectivity monitor and status banner service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Status server port (overrides config file)
    #[arg(long)]
    status_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, status_port={:?}, log_level={:?}",
        args.config,
        args.status_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(status_port) = args.status_port {
        config.status_server.port = status_port;
    }

    tracing::info!("Starting netpulse service");
    tracing::debug!(
        "Probe: {:?}, interval: {:?}, timeout: {:?}",
        config.probe,
        config.probing.interval(),
        config.probing.timeout()
    );

    netpulse::run(config).await?;

    Ok(())
}
