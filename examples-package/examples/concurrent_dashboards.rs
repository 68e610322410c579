//! Concurrent Dashboards Example
//!
//! Several panels share one cache: a batch of different queries, then many
//! overlapping refreshes of the same query racing each other.
//!
//! Run with `RUST_LOG=logtally_cache=debug` to watch resolution and merges.

use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use logtally_core::{CountRequest, LogEvent, Timestamp};
use logtally_executor::{LogSource, MemoryLogSource, QueryOrchestrator};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Concurrent Dashboards Example ===\n");

    let source: Arc<dyn LogSource> = Arc::new(MemoryLogSource::new(sample_events(), 50));
    let orchestrator = Arc::new(QueryOrchestrator::with_defaults(source));

    // Example 1: one batch, several panels
    batch_panels(&orchestrator).await?;

    // Example 2: racing refreshes of one panel
    racing_refreshes(&orchestrator).await?;

    println!("\n=== All examples completed! ===");
    Ok(())
}

fn minute(m: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + TimeDelta::minutes(m)
}

fn sample_events() -> Vec<LogEvent> {
    (0..120)
        .flat_map(|m| {
            let mut events = vec![LogEvent::new(minute(m), "GET /api status:ok")];
            if m % 3 == 0 {
                events.push(LogEvent::new(minute(m), "GET /api status:error"));
            }
            if m % 7 == 0 {
                events.push(LogEvent::new(minute(m), "POST /login status:warn"));
            }
            events
        })
        .collect()
}

async fn batch_panels(orchestrator: &QueryOrchestrator) -> Result<()> {
    println!("--- Example 1: Batch of Panels ---\n");

    let requests = vec![
        CountRequest::new("status:ok", minute(0), minute(30)).with_ref_id("A"),
        CountRequest::new("status:error", minute(0), minute(30)).with_ref_id("B"),
        CountRequest::new("status:warn", minute(0), minute(30)).with_ref_id("C"),
    ];

    let frames = orchestrator.execute_batch(&requests).await?;
    for (ref_id, frame) in &frames {
        println!(
            "Panel {} '{}': {} buckets, {} events",
            ref_id,
            frame.fingerprint,
            frame.len(),
            frame.total()
        );
    }

    Ok(())
}

async fn racing_refreshes(orchestrator: &Arc<QueryOrchestrator>) -> Result<()> {
    println!("\n--- Example 2: Racing Refreshes ---\n");

    let mut handles = Vec::new();
    for i in 0..12 {
        let orchestrator = Arc::clone(orchestrator);
        handles.push(tokio::spawn(async move {
            let start = minute(i * 5);
            let request = CountRequest::new("status:error", start, start + TimeDelta::minutes(30));
            orchestrator.execute(&request).await
        }));
    }

    for handle in handles {
        let frame = handle.await??;
        println!("{}: {} events", frame.range, frame.total());
    }

    let stats = orchestrator.cache_stats();
    println!("\nCache Statistics:");
    println!("  Entries:   {}", stats.entry_count());
    println!("  Requests:  {}", stats.total_requests());
    println!("  Overlaps:  {}", stats.overlaps());
    println!("  Disjoint:  {}", stats.disjoints());
    println!("  Merges:    {}", stats.merges());

    Ok(())
}
