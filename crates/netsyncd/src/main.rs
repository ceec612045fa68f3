//! netsyncd - network state reconciliation daemon
//!
//! Entry point: loads the declared configuration, runs one
//! convergence pass, and exits.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use netsyncd::{routes, FreeBsdAdapter, NodeRole, StaticConfig, SyncEngine};

#[derive(Debug, Parser)]
#[command(name = "netsyncd", about = "Declared-state network reconciliation engine")]
struct Args {
    /// Path to the declared network configuration (YAML).
    #[arg(short, long, default_value = "/etc/netsync.yaml")]
    config: PathBuf,

    /// Failover role of this node.
    #[arg(short, long, default_value = "primary")]
    role: NodeRole,

    /// Sync only this interface instead of a full pass.
    #[arg(short, long)]
    interface: Option<String>,

    /// Log verbosity.
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

/// Initializes tracing/logging subsystem
fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> anyhow::Result<()> {
    let doc = tokio::fs::read_to_string(&args.config)
        .await
        .with_context(|| format!("reading {}", args.config.display()))?;
    let config = StaticConfig::from_yaml(&doc).context("parsing declared configuration")?;

    let engine = SyncEngine::new(config, FreeBsdAdapter::new(), args.role);

    match &args.interface {
        Some(name) => {
            info!(interface = %name, "Syncing single interface");
            engine.sync_interface(name).await?;
        }
        None => {
            info!("Starting full network sync");
            engine.sync().await?;
        }
    }
    routes::sync_routes(engine.config(), engine.os()).await?;

    info!("Network sync complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    info!("--- Starting netsyncd ---");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Network sync failed");
            ExitCode::FAILURE
        }
    }
}
