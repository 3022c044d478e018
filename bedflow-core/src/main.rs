//! bedflow - replay and inspect bed allocation seed files.

use anyhow::{Context, Result};
use bedflow_core::{
    init_tracing, AllocationService, EngineConfig, RequestStatus, ResourceStatus,
    SeedFile, Store,
};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bedflow", version)]
#[command(about = "Priority-driven hospital bed allocation", long_about = None)]
struct Cli {
    /// JSON engine config (defaults apply when omitted)
    #[arg(short, long, env = "BEDFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every seed event in order and print the decisions
    Replay {
        /// Path to the seed JSON file
        #[arg(short, long)]
        seed: PathBuf,
    },

    /// Load a seed and summarize it without applying events
    Check {
        /// Path to the seed JSON file
        #[arg(short, long)]
        seed: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    init_tracing(&config);

    match cli.command {
        Commands::Replay { seed } => replay(&seed, config).await,
        Commands::Check { seed } => check(&seed, config).await,
    }
}

async fn replay(seed_path: &Path, config: EngineConfig) -> Result<()> {
    let (store, events) = SeedFile::load(seed_path)?.into_store();
    let service = AllocationService::start(Arc::new(store), config)
        .await
        .context("Failed to start allocation service")?;

    info!(events = events.len(), "Replaying seed events");
    for (step, event) in events.into_iter().enumerate() {
        match event.apply(&service).await {
            Ok(decision) => println!("{}", serde_json::to_string(&decision)?),
            Err(err) => {
                warn!(step, error = %err, "Seed event rejected");
                let line = serde_json::json!({
                    "action": "ERROR",
                    "step": step,
                    "error": err.to_string(),
                });
                println!("{line}");
            }
        }
    }

    println!();
    println!("RESOURCES");
    for resource in service.list_resources().await {
        println!(
            "  {:<12} {:<10} {:<10} {}",
            resource.id, resource.location, resource.category, resource.status
        );
    }

    println!("WAITLIST");
    for (rank, request) in service.list_waiting_ranked().await.iter().enumerate() {
        println!(
            "  {:>3}. {:<12} p={:<3} {:<10} {}",
            rank + 1,
            request.id,
            request.priority,
            request.required_category,
            request.arrival.to_rfc3339()
        );
    }

    println!("METRICS");
    println!("{}", serde_json::to_string_pretty(&service.metrics())?);
    Ok(())
}

async fn check(seed_path: &Path, config: EngineConfig) -> Result<()> {
    let seed = SeedFile::load(seed_path)?;
    let event_count = seed.events.len();
    let (store, _) = seed.into_store();
    let store: Arc<dyn Store> = Arc::new(store);
    let served = store.list_requests(Some(RequestStatus::Served)).await?.len();
    let service = AllocationService::start(store, config)
        .await
        .context("Failed to start allocation service")?;

    let mut beds: BTreeMap<(String, String), usize> = BTreeMap::new();
    for resource in service.list_resources().await {
        *beds
            .entry((resource.category.to_string(), resource.status.to_string()))
            .or_default() += 1;
    }

    println!("Seed: {}", seed_path.display());
    println!("Beds:");
    for ((category, status), count) in &beds {
        println!("  {category:<10} {status:<9} {count}");
    }
    let free = service
        .list_resources()
        .await
        .iter()
        .filter(|r| r.status == ResourceStatus::Free)
        .count();
    println!("Free beds:        {free}");
    println!("Served requests:  {served}");
    println!("Waiting requests: {}", service.list_waiting().await.len());
    println!("Events:           {event_count}");

    let unrecognized: Vec<_> = service
        .list_resources()
        .await
        .into_iter()
        .filter(|r| !r.category.is_recognized())
        .map(|r| r.id)
        .collect();
    if !unrecognized.is_empty() {
        warn!(resources = ?unrecognized, "Beds with unrecognized category never match");
    }
    Ok(())
}
