//! srv6mgrd - SRv6 VPN reconciliation daemon.
//!
//! Binds the pieces together: loads the per-VRF policy file, creates or
//! attaches to the pinned SID binding table, builds the reconcilers, and
//! drives them through the per-key scheduler until shutdown.

use clap::Parser;
use srv6_mgrd::{AgentConfig, InMemorySpeaker, ReconcileScheduler, VrfManager};
use srv6_locator::LocatorAllocator;
use srv6_sidtable::{global_registry, SidTable};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// SRv6 VPN reconciliation daemon
#[derive(Parser, Debug)]
#[command(name = "srv6mgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the per-VRF policy file (YAML)
    #[arg(short = 'c', long, default_value = "/etc/srv6mgrd/config.yaml")]
    config: PathBuf,

    /// Attach to an existing pinned SID table instead of creating one.
    /// Use for components that must not take ownership of the table.
    #[arg(long)]
    attach: bool,

    /// Full-resync interval in seconds. Every domain is re-triggered at
    /// this cadence to pick up speaker state changes.
    #[arg(long, default_value = "30")]
    resync_interval: u64,

    /// Log filter (e.g. "info", "srv6_mgrd=debug")
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting srv6mgrd ---");

    let config = match AgentConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!(path = %args.config.display(), %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(vrfs = config.vrfs.len(), "configuration loaded");

    // The table must exist before any reconciler runs; failing to reach
    // it is fatal, there is nothing to converge against.
    let table = match SidTable::create_or_open(global_registry(), !args.attach) {
        Ok(table) => table,
        Err(err) => {
            error!(%err, "failed to set up SID binding table");
            return ExitCode::FAILURE;
        }
    };
    info!(capacity = table.capacity(), "SID binding table ready");

    let allocator = Arc::new(LocatorAllocator::new());
    let speaker = Arc::new(InMemorySpeaker::new());

    let manager = match VrfManager::from_config(&config, table, allocator, speaker) {
        Ok(manager) => Arc::new(manager),
        Err(err) => {
            error!(%err, "failed to build VRF reconcilers");
            return ExitCode::FAILURE;
        }
    };

    let scheduler = ReconcileScheduler::new(manager.clone());

    // Initial convergence: every configured domain gets one trigger.
    for key in manager.domain_keys() {
        scheduler.trigger(&key);
    }

    let mut resync = tokio::time::interval(Duration::from_secs(args.resync_interval.max(1)));
    resync.tick().await; // first tick fires immediately, already covered above

    loop {
        tokio::select! {
            _ = resync.tick() => {
                for key in manager.domain_keys() {
                    scheduler.trigger(&key);
                }
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => warn!("received SIGINT, shutting down"),
                    Err(err) => {
                        error!(%err, "failed to listen for shutdown signal");
                        return ExitCode::FAILURE;
                    }
                }
                break;
            }
        }
    }

    // Let in-flight runs finish so no domain is left mid-diff.
    scheduler.quiesce().await;
    info!("srv6mgrd shutdown complete");

    ExitCode::SUCCESS
}

fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}
