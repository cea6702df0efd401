//! quakeswarm - foreshock swarm detection over seismic catalogs
//!
//! This is the main entry point for the quakeswarm command-line interface.
//! Every subcommand loads the catalog, rebuilds the view and answers from it.
//!
//! Usage:
//!   quakeswarm --catalog events.csv build --table swarms.bin --json swarms.json
//!   quakeswarm --catalog events.jsonl swarms us7000abcd
//!   quakeswarm --catalog events.csv near --lat 40.0 --lon 15.0 --radius-km 50

use clap::{Args, Parser, Subcommand};
use quakeswarm::catalog::ingest::{format_timestamp, parse_timestamp};
use quakeswarm::catalog::load_catalog;
use quakeswarm::config::{Parallelism, SwarmConfig};
use quakeswarm::core::TimeRange;
use quakeswarm::logging::init_tracing;
use quakeswarm::view::rebuild;
use quakeswarm::{api::QueryEngine, SwarmError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "quakeswarm")]
#[command(about = "Detect foreshock swarms preceding large earthquakes", long_about = None)]
struct Cli {
    /// Catalog file (.csv, .jsonl, .ndjson or .json lines)
    #[arg(short, long)]
    catalog: PathBuf,

    #[command(flatten)]
    settings: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

/// Configuration file plus per-field overrides.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum magnitude of a mainshock
    #[arg(long)]
    threshold: Option<f64>,

    /// Maximum time between two linked events, in days
    #[arg(long)]
    swarm_window_days: Option<f64>,

    /// Maximum gap between a swarm's end and its mainshock, in days
    #[arg(long)]
    lead_time_days: Option<f64>,

    /// A swarm needs an event this close to the mainshock
    #[arg(long)]
    association_radius_km: Option<f64>,

    #[arg(long)]
    cell_size_km: Option<f64>,

    #[arg(long)]
    max_swarms: Option<usize>,

    /// Cluster in this many latitude bands in parallel
    #[arg(long)]
    tiles: Option<usize>,

    /// Only keep events tagged with this region
    #[arg(long)]
    region: Option<String>,
}

impl ConfigArgs {
    fn resolve(&self) -> quakeswarm::Result<SwarmConfig> {
        let mut config = match &self.config {
            Some(path) => SwarmConfig::from_json_file(path)?,
            None => SwarmConfig::default(),
        };
        if let Some(v) = self.threshold {
            config = config.with_mainshock_threshold(v);
        }
        if let Some(v) = self.swarm_window_days {
            config = config.with_swarm_window_days(v);
        }
        if let Some(v) = self.lead_time_days {
            config = config.with_lead_time_window_days(v);
        }
        if let Some(v) = self.association_radius_km {
            config = config.with_association_radius_km(v);
        }
        if let Some(v) = self.cell_size_km {
            config = config.with_cell_size_km(v);
        }
        if let Some(v) = self.max_swarms {
            config = config.with_max_swarms_per_mainshock(v);
        }
        if let Some(tiles) = self.tiles {
            config = config.with_parallelism(Parallelism::Tiled { tiles });
        }
        if let Some(region) = &self.region {
            config = config.with_region_filter(region.clone());
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the view, print its summary and optionally persist the swarm table
    Build {
        /// Write the swarm table as bincode
        #[arg(long)]
        table: Option<PathBuf>,
        /// Write the swarm table as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Swarms preceding a mainshock
    Swarms { mainshock_id: String },
    /// Cluster holding an event
    Cluster { event_id: String },
    /// Member rows of a swarm relative to its mainshock
    Members { swarm_id: u32 },
    /// Clusters no mainshock claimed
    Unclassified,
    /// Swarms whose centroid lies near a point
    Near {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long)]
        radius_km: f64,
        /// RFC 3339 or epoch milliseconds
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> quakeswarm::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_bound(text: Option<&str>, unbounded: i64) -> quakeswarm::Result<i64> {
    match text {
        None => Ok(unbounded),
        Some(text) => {
            parse_timestamp(text).ok_or_else(|| SwarmError::Parse(format!("invalid timestamp '{}'", text)))
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = cli.settings.resolve()?;
    let catalog = load_catalog(&cli.catalog)?;
    let view = Arc::new(rebuild(&catalog, &config)?);
    let engine = QueryEngine::new(Arc::clone(&view));

    match cli.command {
        Command::Build { table, json } => {
            if let Some(bounds) = catalog.time_bounds() {
                eprintln!(
                    "Catalog spans {} to {}",
                    format_timestamp(bounds.start),
                    format_timestamp(bounds.end)
                );
            }
            print_json(&engine.rebuild_summary())?;
            let swarm_table = view.to_table();
            if let Some(path) = table {
                swarm_table.save_to_file(&path)?;
                eprintln!("Wrote {} swarms to {}", swarm_table.len(), path.display());
            }
            if let Some(path) = json {
                swarm_table.save_json(&path)?;
                eprintln!("Wrote {} swarms to {}", swarm_table.len(), path.display());
            }
        }
        Command::Swarms { mainshock_id } => print_json(&engine.swarms_for_mainshock(&mainshock_id))?,
        Command::Cluster { event_id } => print_json(&engine.cluster_for_event(&event_id)?)?,
        Command::Members { swarm_id } => print_json(&engine.swarm_members(swarm_id)?)?,
        Command::Unclassified => print_json(&engine.unclassified_clusters())?,
        Command::Near { lat, lon, radius_km, start, end } => {
            let range = TimeRange::new(
                parse_bound(start.as_deref(), i64::MIN)?,
                parse_bound(end.as_deref(), i64::MAX)?,
            );
            print_json(&engine.swarms_near(lat, lon, radius_km, range))?;
        }
    }

    Ok(())
}
