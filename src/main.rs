use vessel_registry::config::AppConfig;
use vessel_registry::ingestion::sources::{noaa_daily_urls, scan_directory};
use vessel_registry::ingestion::{IngestionOrchestrator, RunTracker, SourceLocator, SourceOutcome};
use vessel_registry::lookup::RapidApiLookup;
use vessel_registry::registry::open_registry;
use vessel_registry::resolver::IdentityResolver;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vessel-registry")]
#[command(about = "AIS vessel registry ingestion and vessel identity resolution")]
#[command(version)]
struct Args {
    /// Environment file to load before reading configuration
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest AIS archives into the vessel registry
    Ingest {
        /// Directory to scan for *.csv.zst archives
        #[arg(long)]
        dir: Option<PathBuf>,

        /// First day of NOAA daily archives to stream (YYYY-MM-DD)
        #[arg(long, requires = "noaa_to")]
        noaa_from: Option<NaiveDate>,

        /// Last day of NOAA daily archives to stream, inclusive
        #[arg(long, requires = "noaa_from")]
        noaa_to: Option<NaiveDate>,

        /// Explicit archive paths or URLs
        sources: Vec<String>,
    },
    /// Resolve vessel names to MMSI / IMO
    Resolve {
        /// Vessel names, as they appear in documents
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List sources already recorded as processed
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    match args.command {
        Commands::Ingest {
            dir,
            noaa_from,
            noaa_to,
            sources,
        } => run_ingest(config, dir, noaa_from.zip(noaa_to), sources).await,
        Commands::Resolve { names } => run_resolve(config, names).await,
        Commands::Status => run_status(config),
    }
}

async fn run_ingest(
    config: AppConfig,
    dir: Option<PathBuf>,
    noaa_range: Option<(NaiveDate, NaiveDate)>,
    explicit: Vec<String>,
) -> Result<()> {
    let mut sources: Vec<SourceLocator> = Vec::new();
    if let Some(dir) = dir {
        let found = scan_directory(&dir)
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        info!("Found {} archives in {}", found.len(), dir.display());
        sources.extend(found);
    }
    if let Some((from, to)) = noaa_range {
        if from > to {
            bail!("--noaa-from {} is after --noaa-to {}", from, to);
        }
        sources.extend(noaa_daily_urls(from, to));
    }
    sources.extend(explicit.iter().map(|s| SourceLocator::parse(s)));

    if sources.is_empty() {
        bail!("No sources given; pass --dir, --noaa-from/--noaa-to, or archive paths");
    }

    let registry = open_registry(&config.registry)
        .await
        .context("Failed to open vessel registry")?;
    let orchestrator = IngestionOrchestrator::new(registry, config.ingestion);

    let summary = orchestrator
        .run(&sources)
        .await
        .context("Ingestion run aborted")?;

    for (source_id, outcome) in &summary.outcomes {
        match outcome {
            SourceOutcome::Completed(result) => info!(
                "{}: {:?}, {} rows read, {} kept, {} vessels, {} records written",
                source_id,
                result.status,
                result.rows_read,
                result.rows_kept,
                result.unique_vessels,
                result.upsert.records_written
            ),
            SourceOutcome::Failed(reason) => error!("{}: failed: {}", source_id, reason),
            SourceOutcome::Skipped => {}
        }
    }

    if summary.failed() > 0 {
        bail!("{} of {} sources failed", summary.failed(), sources.len());
    }
    Ok(())
}

async fn run_resolve(config: AppConfig, names: Vec<String>) -> Result<()> {
    let registry = open_registry(&config.registry)
        .await
        .context("Failed to open vessel registry")?;
    let lookup = RapidApiLookup::new(config.lookup).context("Failed to build lookup client")?;
    let resolver =
        IdentityResolver::with_options(registry, Arc::new(lookup), &config.resolver);

    for name in names {
        let result = resolver.resolve(&name).await;
        let line = serde_json::json!({ "name": name, "result": result });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn run_status(config: AppConfig) -> Result<()> {
    let path = &config.ingestion.tracking_file;
    let tracker = RunTracker::load(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("{} processed sources ({})", tracker.len(), path.display());
    for source_id in tracker.processed() {
        println!("  {}", source_id);
    }
    Ok(())
}
