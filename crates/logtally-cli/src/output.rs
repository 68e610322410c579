//! Rendering of count frames and cache statistics

use crate::config::OutputFormat;
use anyhow::Result;
use arrow::csv::Writer as CsvWriter;
use arrow::json::LineDelimitedWriter;
use comfy_table::{Cell, Color, Table as ComfyTable};
use logtally_cache::CacheStats;
use logtally_core::CountFrame;
use std::io::Write;

/// Write a frame to `out` in the requested format
pub fn write_frame<W: Write>(frame: &CountFrame, format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Table => writeln!(out, "{}", frame_table(frame))?,
        OutputFormat::Csv => {
            let batch = frame.to_record_batch()?;
            let mut writer = CsvWriter::new(&mut *out);
            writer.write(&batch)?;
        }
        OutputFormat::Json => {
            let batch = frame.to_record_batch()?;
            let mut writer = LineDelimitedWriter::new(&mut *out);
            writer.write(&batch)?;
            writer.finish()?;
        }
    }
    Ok(())
}

pub fn frame_table(frame: &CountFrame) -> ComfyTable {
    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Minute").fg(Color::Cyan),
        Cell::new("Entries").fg(Color::Green),
    ]);

    for point in &frame.points {
        table.add_row(vec![
            point.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            point.count.to_string(),
        ]);
    }

    table
}

pub fn stats_table(stats: &CacheStats, enabled: bool) -> ComfyTable {
    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Metric").fg(Color::Cyan),
        Cell::new("Value").fg(Color::Green),
    ]);

    table.add_row(vec!["Enabled", if enabled { "Yes" } else { "No" }]);
    table.add_row(vec!["Entries", &stats.entry_count().to_string()]);
    table.add_row(vec!["Total Requests", &stats.total_requests().to_string()]);
    table.add_row(vec!["Overlaps", &stats.overlaps().to_string()]);
    table.add_row(vec!["Disjoint", &stats.disjoints().to_string()]);
    table.add_row(vec!["Misses", &stats.misses().to_string()]);
    table.add_row(vec![
        "Hit Rate",
        &format!("{:.1}%", stats.hit_rate() * 100.0),
    ]);
    table.add_row(vec!["Merges", &stats.merges().to_string()]);
    table.add_row(vec!["Pruned Buckets", &stats.pruned_buckets().to_string()]);
    table.add_row(vec!["Upstream Pages", &stats.upstream_pages().to_string()]);
    table.add_row(vec!["Fetched Events", &stats.fetched_events().to_string()]);
    table.add_row(vec!["Upstream Errors", &stats.upstream_errors().to_string()]);

    table
}
