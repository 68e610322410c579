use crate::config::{Config, OutputFormat};
use crate::output::{stats_table, write_frame};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use logtally_core::{CountRequest, Timestamp};
use logtally_executor::{LogSource, MemoryLogSource, QueryOrchestrator};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub async fn run_query(
    config: &Config,
    events: &Path,
    query: &str,
    start: &str,
    end: &str,
    output: OutputFormat,
) -> Result<()> {
    let request = CountRequest::new(query, parse_timestamp(start)?, parse_timestamp(end)?);
    let orchestrator = build_orchestrator(config, events)?;

    println!(
        "{} Counting '{}' over {}",
        "→".bright_blue(),
        query.bright_cyan(),
        request.range
    );

    let started = Instant::now();
    let frame = orchestrator.execute(&request).await?;
    let elapsed = started.elapsed();

    write_frame(&frame, output, &mut std::io::stdout().lock())?;
    println!(
        "{} {} buckets, {} entries",
        "✓".bright_green(),
        frame.len(),
        frame.total()
    );
    if config.show_timing {
        println!(
            "{} {:.2}ms",
            "Query time:".bright_yellow(),
            elapsed.as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

/// Run a sequence of requests through one orchestrator, so later requests
/// reuse what earlier ones cached
pub async fn run_replay(
    config: &Config,
    events: &Path,
    requests: &Path,
    output: OutputFormat,
) -> Result<()> {
    let contents = std::fs::read_to_string(requests)
        .with_context(|| format!("Failed to read requests from {:?}", requests))?;
    let requests: Vec<CountRequest> =
        serde_json::from_str(&contents).context("Requests must be a JSON array")?;
    let orchestrator = build_orchestrator(config, events)?;

    info!("Replaying {} requests", requests.len());

    for (i, request) in requests.iter().enumerate() {
        println!(
            "{} [{}/{}] '{}' {}",
            "→".bright_blue(),
            i + 1,
            requests.len(),
            request.query_text.bright_cyan(),
            request.range
        );

        let started = Instant::now();
        match orchestrator.execute(request).await {
            Ok(frame) => {
                write_frame(&frame, output, &mut std::io::stdout().lock())?;
                if config.show_timing {
                    println!(
                        "{} {:.2}ms",
                        "Query time:".bright_yellow(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => println!("{} {}", "✗".bright_red(), e),
        }
    }

    println!();
    println!("{}", "Cache Statistics".bright_yellow().bold());
    println!();
    println!(
        "{}",
        stats_table(&orchestrator.cache_stats(), orchestrator.cache().is_enabled())
    );

    Ok(())
}

pub async fn run_health(config: &Config, events: &Path) -> Result<()> {
    let orchestrator = build_orchestrator(config, events)?;
    let result = orchestrator.check_health().await;

    if result.is_ok() {
        println!("{} {}", "✓".bright_green(), result.message);
        Ok(())
    } else {
        println!("{} {}", "✗".bright_red(), result.message);
        anyhow::bail!("Health check failed with status {}", result.status)
    }
}

fn build_orchestrator(config: &Config, events: &Path) -> Result<QueryOrchestrator> {
    if !events.exists() {
        anyhow::bail!("Events file not found: {:?}", events);
    }

    let source = MemoryLogSource::from_json_file(events, config.page_size)
        .with_context(|| format!("Failed to load events from {:?}", events))?;
    info!(
        "Loaded {} events from {}, {} per page",
        source.len(),
        source.name(),
        source.page_size()
    );

    Ok(
        QueryOrchestrator::new(Arc::new(source), config.cache.clone())
            .with_config(config.orchestrator.clone()),
    )
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Result<Timestamp> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp '{}', expected RFC 3339", value))?;
    Ok(parsed.with_timezone(&Utc))
}
