//! Incremental Counts Example
//!
//! Polls a sliding ten-minute window the way a dashboard refresh would and
//! shows how little of each request goes upstream.

use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use logtally_cache::CacheConfig;
use logtally_core::{CountRequest, LogEvent, Timestamp};
use logtally_executor::{LogSource, MemoryLogSource, QueryOrchestrator};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Incremental Counts Example ===\n");

    // Example 1: Sliding window reuse
    sliding_window().await?;

    // Example 2: Late arrivals inside the safety margin
    late_arrivals().await?;

    // Example 3: Cache disabled
    without_cache().await?;

    println!("\n=== All examples completed! ===");
    Ok(())
}

fn minute(m: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + TimeDelta::minutes(m)
}

/// An error every minute, and a burst every fifth minute
fn sample_events() -> Vec<LogEvent> {
    (0..60)
        .flat_map(|m| {
            let burst = if m % 5 == 0 { 3 } else { 1 };
            (0..burst).map(move |i| {
                LogEvent::new(minute(m) + TimeDelta::seconds(i * 10), "GET /api status:error")
            })
        })
        .collect()
}

/// Example 1: each refresh only fetches the trailing edge
async fn sliding_window() -> Result<()> {
    println!("--- Example 1: Sliding Window ---\n");

    let source = Arc::new(MemoryLogSource::new(sample_events(), 25));
    let orchestrator = QueryOrchestrator::with_defaults(Arc::clone(&source) as Arc<dyn LogSource>);

    for refresh in 0..5 {
        let start = minute(refresh * 5);
        let request = CountRequest::new("status:error", start, start + TimeDelta::minutes(10));
        let frame = orchestrator.execute(&request).await?;

        let fetched = source.requested_ranges();
        let last = fetched.last().map(|r| r.to_string()).unwrap_or_default();
        println!(
            "Refresh {}: {} buckets, {} events, fetched {}",
            refresh,
            frame.len(),
            frame.total(),
            last
        );
    }

    let stats = orchestrator.cache_stats();
    println!("\nCache Statistics:");
    println!("  Misses:         {}", stats.misses());
    println!("  Overlaps:       {}", stats.overlaps());
    println!("  Hit Rate:       {:.1}%", stats.hit_rate() * 100.0);
    println!("  Upstream pages: {}", stats.upstream_pages());
    println!("  Pruned buckets: {}", stats.pruned_buckets());

    Ok(())
}

/// Example 2: the re-fetched margin corrects minutes that were still filling
async fn late_arrivals() -> Result<()> {
    println!("\n--- Example 2: Late Arrivals ---\n");

    let source = Arc::new(MemoryLogSource::new(sample_events(), 100));
    let orchestrator = QueryOrchestrator::with_defaults(Arc::clone(&source) as Arc<dyn LogSource>);

    let first = CountRequest::new("status:error", minute(0), minute(10));
    let frame = orchestrator.execute(&first).await?;
    println!("First poll: minute 9 has {} entries", count_at(&frame.points, minute(9)));

    source.push(LogEvent::new(minute(9) + TimeDelta::seconds(45), "late status:error"));
    println!("One more event lands in minute 9 after the poll");

    let second = CountRequest::new("status:error", minute(5), minute(15));
    let frame = orchestrator.execute(&second).await?;
    println!("Second poll: minute 9 has {} entries", count_at(&frame.points, minute(9)));

    Ok(())
}

/// Example 3: a disabled cache fetches every request in full
async fn without_cache() -> Result<()> {
    println!("\n--- Example 3: Cache Disabled ---\n");

    let source = Arc::new(MemoryLogSource::new(sample_events(), 100));
    let orchestrator = QueryOrchestrator::new(
        Arc::clone(&source) as Arc<dyn LogSource>,
        CacheConfig::disabled(),
    );

    for refresh in 0..3 {
        let start = minute(refresh * 5);
        let request = CountRequest::new("status:error", start, start + TimeDelta::minutes(10));
        orchestrator.execute(&request).await?;
    }

    println!("Requested ranges:");
    for range in source.requested_ranges() {
        println!("  {}", range);
    }
    println!("Cached entries: {}", orchestrator.cache().len());

    Ok(())
}

fn count_at(points: &[logtally_core::MinuteCount], at: Timestamp) -> u64 {
    points
        .iter()
        .find(|p| p.timestamp == at)
        .map(|p| p.count)
        .unwrap_or(0)
}
