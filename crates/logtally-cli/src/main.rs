use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::*;
use config::{Config, OutputFormat};

#[derive(Parser)]
#[command(name = "lt")]
#[command(author, version, about = "Logtally - incremental per-minute log counts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count matching events per minute
    Query {
        /// JSON file holding an array of log events
        #[arg(short, long)]
        events: PathBuf,

        /// Query text
        #[arg(short, long)]
        query: String,

        /// Range start (RFC 3339)
        #[arg(short, long)]
        start: String,

        /// Range end, exclusive (RFC 3339)
        #[arg(short = 'E', long)]
        end: String,

        /// Output format (table, json, csv)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run a JSON array of requests through one cache
    Replay {
        /// JSON file holding an array of log events
        #[arg(short, long)]
        events: PathBuf,

        /// JSON file holding an array of count requests
        #[arg(short, long)]
        requests: PathBuf,

        /// Output format (table, json, csv)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Check that the event source answers
    Health {
        /// JSON file holding an array of log events
        #[arg(short, long)]
        events: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Query {
            events,
            query,
            start,
            end,
            output,
        } => {
            let format = output_format(&config, output.as_deref())?;
            run_query(&config, &events, &query, &start, &end, format).await?;
        }
        Commands::Replay {
            events,
            requests,
            output,
        } => {
            let format = output_format(&config, output.as_deref())?;
            run_replay(&config, &events, &requests, format).await?;
        }
        Commands::Health { events } => {
            run_health(&config, &events).await?;
        }
    }

    Ok(())
}

fn output_format(config: &Config, flag: Option<&str>) -> Result<OutputFormat> {
    match flag {
        Some(value) => value.parse(),
        None => Ok(config.output_format),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "logtally_cli=debug,logtally_core=debug,logtally_cache=debug,logtally_executor=debug"
    } else {
        "logtally_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
