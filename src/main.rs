mod api;
mod config;
mod device;
mod geocoding;
mod lorawan;
mod metrics;
mod storage;
mod ttn;

#[cfg(test)]
mod testutil;

use anyhow::Context;
use clap::{Parser, Subcommand};
use device::DeviceManager;
use geocoding::W3wClient;
use metrics::GeocodingCallCounter;
use std::path::PathBuf;
use std::sync::Arc;
use storage::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ttn::TtnClient;

#[derive(Parser)]
#[command(name = "lora-inventory")]
#[command(about = "Inventory of LoRaWAN sensor nodes, registered on The Things Network")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API (default)
    Serve,
    /// Run the save workflow for one stored device
    Register {
        /// Device name
        name: String,
    },
    /// Print the device record held by TTN
    Details {
        /// Device name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = config::Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        config::Config::default()
    });
    config.apply_env_overrides();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("lora-inventory v{}", env!("CARGO_PKG_VERSION"));

    let ttn = Arc::new(TtnClient::new(config.ttn.clone()).context("building TTN client")?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Details { name } => {
            let details = ttn
                .details(&name)
                .await
                .with_context(|| format!("reading {name} from TTN"))?;
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
        Command::Register { name } => {
            let (manager, _, _) = build(&config, ttn).await?;
            let loaded = manager.load(&name).await?;
            let device = manager.save(&loaded).await?;
            println!("{}", serde_json::to_string_pretty(&device)?);
            Ok(())
        }
        Command::Serve => serve(&config, ttn).await,
    }
}

async fn build(
    config: &config::Config,
    ttn: Arc<TtnClient>,
) -> anyhow::Result<(Arc<DeviceManager>, Database, Arc<GeocodingCallCounter>)> {
    let db = Database::open(&config.database.path)
        .await
        .with_context(|| format!("opening database {}", config.database.path.display()))?;

    let counter = Arc::new(GeocodingCallCounter::new());
    let geocoder = W3wClient::new(config.geocoding.clone(), counter.clone())
        .context("building what3words client")?;

    if config.geocoding.api_key.is_empty() {
        warn!("No what3words API key configured; geocoding calls will be rejected");
    }

    let manager = DeviceManager::new(Arc::new(db.clone()), ttn, Arc::new(geocoder));
    Ok((Arc::new(manager), db, counter))
}

async fn serve(config: &config::Config, ttn: Arc<TtnClient>) -> anyhow::Result<()> {
    let (manager, db, counter) = build(config, ttn).await?;
    let app = api::router(api::AppState {
        manager,
        db,
        counter,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!("Listening on {}. Press Ctrl+C to stop.", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down...");
    Ok(())
}
