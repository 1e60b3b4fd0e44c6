//! `realign` - re-anchor extracted chunks onto a transformed document.
//!
//! Reads a JSON array of chunks and the target text, runs the cascade, and
//! writes the ordered results with run statistics as JSON.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use realign::{RealignConfig, TracingProgress, parse_chunks, realign_document};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "realign", version, about = "Re-anchor document chunks onto transformed text")]
struct Cli {
    /// JSON array of chunks (`sequence_index`, `content`, `structural_metadata`)
    #[arg(long)]
    chunks: PathBuf,

    /// Transformed document text
    #[arg(long)]
    target: PathBuf,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write results here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn init_tracing(config: &RealignConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RealignConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RealignConfig::default(),
    };
    init_tracing(&config);

    let chunks_json = fs::read_to_string(&cli.chunks)
        .with_context(|| format!("reading chunks {}", cli.chunks.display()))?;
    let chunks = parse_chunks(&chunks_json)?;
    let target = fs::read_to_string(&cli.target)
        .with_context(|| format!("reading target {}", cli.target.display()))?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, finishing with interpolation...");
            on_ctrl_c.cancel();
        }
    });

    let report = realign_document(
        &config,
        &chunks,
        &target,
        Some(Arc::new(TracingProgress)),
        &cancel,
    )
    .await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match &cli.output {
        Some(path) => fs::write(path, json + "\n")
            .with_context(|| format!("writing results {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
