//! IOU Node entry point.
//!
//! Serves the debt ledger over HTTP with configuration from a TOML file or defaults.

// Accessors kept for tests.
#![allow(dead_code)]

mod api;
mod config;
mod node;
mod state;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{IouConfig, StorageBackend};
use node::IouNode;

/// IOU Node
#[derive(Parser, Debug)]
#[command(name = "iou-node", version, about = "IOU debt ledger node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "iou.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the data directory. Implies the rocksdb backend.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init {
        let config = IouConfig::default();
        config.save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    let mut config = IouConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.backend = StorageBackend::Rocksdb;
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    tracing::info!("IOU node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = IouNode::new(config)?;
    node.start().await?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received shutdown signal"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "node error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("IOU node exited cleanly");
    Ok(())
}
