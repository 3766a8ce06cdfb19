//! file-relay binary: runs either role, or maintenance commands against a store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use file_relay::config::resolve_config;
use file_relay::lifecycle::{run_front, run_worker, spawn_signal_handler, startup::open_store};
use file_relay::observability::{init_logging, metrics};
use file_relay::store::Sweeper;
use file_relay::{RelayConfig, Shutdown};

#[derive(Parser)]
#[command(name = "file-relay")]
#[command(about = "HTTP relay mediated by a shared record directory", long_about = None)]
struct Cli {
    /// TOML config file (falls back to $RELAY_CONFIG, then defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept HTTP requests and relay them through the store
    Front,
    /// Claim stored requests and execute them against the target
    Worker,
    /// Remove stale locks and orphaned records once, then exit
    Sweep,
    /// Print store contents as JSON
    Inspect,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "file-relay starting");

    match cli.command {
        Commands::Front => {
            let shutdown = start_role(&config);
            run_front(&config, &shutdown).await?;
        }
        Commands::Worker => {
            let shutdown = start_role(&config);
            run_worker(&config, &shutdown).await?;
        }
        Commands::Sweep => {
            let store = open_store(&config).await?;
            let report = Sweeper::new(store, &config.store).sweep_once().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Inspect => {
            let store = open_store(&config).await?;
            let inventory = store.inventory().await?;
            println!("{}", serde_json::to_string_pretty(&inventory)?);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Install the metrics exporter if enabled and wire OS signals to a fresh `Shutdown`.
fn start_role(config: &RelayConfig) -> Shutdown {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    shutdown
}
