//! Energy monitor companion process
//!
//! Binds its own bus address and polls the energy counter on a fixed
//! period, logging the derived watt-hour figure. Has no interaction with
//! the control service's queue or controller.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gea_bus::{DeviceBus, HttpBusClient};
use tracing::{debug, info};

use heatersrv::config::Config;
use heatersrv::error::Result;

/// Bus address the monitor binds as, distinct from the control service
const MONITOR_BUS_ADDRESS: u8 = 0x83;

#[derive(Parser, Debug)]
#[command(author, version, about = "monitor - water heater energy monitor")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll period in milliseconds
    #[arg(long, default_value_t = 3000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    config.bus.address = MONITOR_BUS_ADDRESS;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let bus = HttpBusClient::connect(&config.bus).await?;
    info!(interval_ms = args.interval_ms, "energy monitor started");

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    loop {
        ticker.tick().await;
        match bus.read_kwh().await {
            Ok(reading) => info!("{:.3} Wh", reading.energy_ws / 3600.0),
            Err(e) => debug!("energy read failed, skipping sample: {e}"),
        }
    }
}
