//! HTTP Server Binary for quakeswarm
//!
//! Loads a catalog (when given), builds the first view and serves the read API.
//! `POST /api/rebuild` reloads the catalog and swaps in a fresh view.
//!
//! Usage:
//!   cargo run --bin http_server -- --host 0.0.0.0 --port 8080 --catalog data/events.csv

use clap::Parser;
use quakeswarm::{
    api::SwarmService, catalog::load_catalog, config::SwarmConfig, http::start_server,
    logging::init_tracing,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "quakeswarm HTTP Server")]
#[command(about = "HTTP API server for quakeswarm swarm views", long_about = None)]
struct Args {
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Catalog to build the first view from and to reload on rebuild
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SwarmConfig::from_json_file(path)?,
        None => SwarmConfig::default(),
    };

    let service = SwarmService::new();
    match &args.catalog {
        Some(path) => {
            info!("Building initial view from {}", path.display());
            let catalog = load_catalog(path)?;
            let summary = service.rebuild(&catalog, &config)?;
            info!(
                "Initial view: {} events, {} clusters, {} swarms",
                summary.events_processed, summary.clusters_formed, summary.swarms_matched
            );
        }
        None => warn!("No catalog given; serving an empty view until a rebuild names one"),
    }

    let addr = format!("{}:{}", args.host, args.port);

    // Set up graceful shutdown
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        result = start_server(&addr, service, args.catalog, config) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal => {
            info!("Server shut down gracefully");
        }
    }

    Ok(())
}
