//! EO product ingestion CLI.
//!
//! Resolves the storage platform for this host and writes datasets to it as
//! datacubes, raster bands or metadata documents.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "eo-ingest")]
#[command(about = "Write EO products to append-only datacube stores")]
struct Args {
    /// Directory holding the platform profiles
    #[arg(long, env = "EO_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve source and sink platforms and print them
    Resolve,

    /// Write a JSON-serialised dataset
    Write {
        /// Dataset file (JSON)
        #[arg(long)]
        dataset: PathBuf,

        /// Product metadata file (JSON)
        #[arg(long)]
        metadata: PathBuf,

        /// Output kind: datacube, metadata or raster
        #[arg(long, default_value = "datacube")]
        kind: String,

        /// Raster export: only this variable
        #[arg(long)]
        variable: Option<String>,

        /// Write to a local directory instead of the resolved platform
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config_dir = args
        .config_dir
        .unwrap_or_else(platform_resolver::config_dir);
    info!(config_dir = %config_dir.display(), "Starting eo-ingest");

    match args.command {
        Command::Resolve => commands::resolve(&config_dir).await,
        Command::Write {
            dataset,
            metadata,
            kind,
            variable,
            store_dir,
        } => {
            let request = commands::WriteRequest {
                dataset,
                metadata,
                kind,
                variable,
                store_dir,
            };
            commands::write(&config_dir, request).await
        }
    }
}
