//! Control service entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gea_bus::{DeviceBus, HttpBusClient};
use tokio::sync::RwLock;
use tracing::info;

use heatersrv::api::{self, AppState};
use heatersrv::bootstrap;
use heatersrv::config::Config;
use heatersrv::controller::ModeController;
use heatersrv::error::Result;
use heatersrv::modes::ModeRegistry;
use heatersrv::queue::QueueEngine;

#[derive(Parser, Debug)]
#[command(author, version, about = "heatersrv - water heater mode control service")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check configuration and gateway connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = args.config {
        Config::from_file(config_path)?
    } else if let Ok(config_file) = std::env::var("CONFIG_FILE") {
        Config::from_file(config_file)?
    } else {
        Config::load()?
    };
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .init();

    match args.command {
        Some(Commands::Check) => check_config(config).await,
        None => run_service(config).await,
    }
}

async fn run_service(config: Config) -> Result<()> {
    info!("starting {}", config.service.name);

    let bus: Arc<dyn DeviceBus> = Arc::new(HttpBusClient::connect(&config.bus).await?);

    // Startup reconciliation happens before the listener is up so no
    // request ever observes unreconciled state.
    let live = bootstrap::read_live_state(bus.as_ref()).await?;
    let (registry, bootstrapped) = ModeRegistry::load(&config.modes.file, live.mode, live.temp)?;
    info!(modes = registry.len(), "mode registry loaded");

    let active_mode = Arc::new(RwLock::new(None));
    let queue = QueueEngine::new(Duration::from_millis(config.queue.base_interval_ms));
    queue.spawn_drain(bus.clone(), active_mode.clone());

    let controller = ModeController::new(Arc::new(registry), queue, active_mode);
    bootstrap::reconcile(&controller, bootstrapped, live).await?;

    let state = Arc::new(AppState {
        controller,
        bus,
    });
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .map_err(|e| heatersrv::HeaterSrvError::config(format!("invalid api address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn check_config(config: Config) -> Result<()> {
    println!("=== heatersrv configuration check ===\n");

    config.validate()?;
    println!("✓ configuration valid");

    println!("\n--- service ---");
    println!("name: {}", config.service.name);
    println!("api: http://{}:{}", config.api.host, config.api.port);
    println!("mode store: {}", config.modes.file.display());
    println!("queue base interval: {} ms", config.queue.base_interval_ms);

    println!("\n--- bus gateway ---");
    println!("url: {}", config.bus.gateway_url);
    println!("address: 0x{:02x}", config.bus.address);

    print!("gateway connection: ");
    match HttpBusClient::connect(&config.bus).await {
        Ok(bus) => {
            println!("✓ connected");
            match bus.read_temp_setting().await {
                Ok(temp) => println!("temperature setpoint: {temp}°F"),
                Err(e) => println!("✗ setpoint read failed: {e}"),
            }
        }
        Err(e) => {
            println!("✗ failed: {e}");
            return Err(e.into());
        }
    }

    println!("\n✓ all checks passed");
    Ok(())
}
