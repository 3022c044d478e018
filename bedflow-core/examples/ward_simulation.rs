//! Ward Simulation
//!
//! Drives an [`AllocationService`] through a busy shift: a wave of
//! admissions that overflows the ward, discharges that reassign beds to the
//! waitlist, an overflow bed opened mid-shift and manual overrides.
//!
//! ```sh
//! cargo run -p bedflow-core --example ward_simulation
//! ```

use std::sync::Arc;
use std::time::Instant;

use bedflow_core::{
    init_tracing, AllocationService, Category, Decision, EngineConfig, MemoryStore, NewRequest,
    Request, Resource,
};
use chrono::Utc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig {
        log_filter: "warn".to_string(),
        ..EngineConfig::default()
    };
    init_tracing(&config);

    let ward = vec![
        Resource::new("ICU-1", "I101", Category::Icu),
        Resource::new("ICU-2", "I102", Category::Icu),
        Resource::new("GEN-1", "G201", Category::General),
        Resource::new("GEN-2", "G202", Category::General),
        Resource::new("GEN-3", "G305", Category::General),
        Resource::new("ER-1", "E1", Category::Emergency),
    ];
    // Left over from the night shift: waiting while general beds were closed.
    let holdover = Request::new("P00", "Holdover", 1, Category::General, Utc::now());
    let store = MemoryStore::with_records(ward, vec![holdover]);
    let service = AllocationService::start(Arc::new(store), config).await?;

    println!("Shift start: 6 beds, 1 holdover");
    println!("═══════════════════════════════════════════════════════════");

    let start = Instant::now();
    report(&service.manual_allocate("P00").await?);
    let arrivals = [
        ("P01", 9, Category::Icu),
        ("P02", 4, Category::General),
        ("P03", 7, Category::Icu),
        ("P04", 10, Category::Icu),
        ("P05", 2, Category::General),
        ("P06", 6, Category::Emergency),
        ("P07", 3, Category::General),
        ("P08", 8, Category::Emergency),
        ("P09", 5, Category::General),
        ("P10", 1, Category::Icu),
    ];
    for (id, priority, category) in arrivals {
        let decision = service
            .admit(NewRequest::new(id, format!("Patient {id}"), priority, category))
            .await?;
        report(&decision);
    }

    println!();
    println!("Discharges");
    println!("═══════════════════════════════════════════════════════════");
    for bed in ["ICU-1", "GEN-2", "ER-1"] {
        report(&service.release(bed).await?);
    }

    println!();
    println!("Overflow bed opened, then manual override for P10");
    println!("═══════════════════════════════════════════════════════════");
    report(&service.add_resource(Resource::new("GEN-4", "G410", Category::General)).await?);
    report(&service.manual_allocate("P10").await?);
    report(&service.release("ICU-2").await?);

    let elapsed = start.elapsed();
    println!();
    println!("Still waiting (in service order)");
    println!("═══════════════════════════════════════════════════════════");
    for request in service.list_waiting_ranked().await {
        println!("  {} p={} {}", request.id, request.priority, request.required_category);
    }

    println!();
    println!("📊 Shift report ({elapsed:.2?})");
    println!("{}", serde_json::to_string_pretty(&service.metrics())?);
    Ok(())
}

fn report(decision: &Decision) {
    let request = decision.request().map(|r| r.id.as_str()).unwrap_or("-");
    let resource = decision.resource().map(|r| r.id.as_str()).unwrap_or("-");
    match decision {
        Decision::Failure { reason } => println!("  {:<11} {request:<5} ({reason})", decision.action()),
        _ => println!("  {:<11} {request:<5} {resource}", decision.action()),
    }
}
