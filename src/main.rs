//! Bridge watchdog daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────── bridge-watchdog ────────────────────────────┐
//!   │                                                                         │
//!   │  ┌──────────┐  probe   ┌──────────┐  threshold  ┌──────────────────┐    │
//!   │  │  ticker  │─────────▶│ tracker  │────────────▶│ recovery trigger │────┼──▶ remote hook
//!   │  └──────────┘          └──────────┘             └────────┬─────────┘    │
//!   │       ▲                                                  │ verify_at    │
//!   │       │ force-sync / force-heal                          ▼              │
//!   │  ┌──────────┐          ┌──────────┐   verdict   ┌──────────────────┐    │
//!   │  │ admin API│◀─────────│ snapshot │◀────────────│    verifier      │    │
//!   │  └──────────┘          └──────────┘             └────────┬─────────┘    │
//!   │                                                          ▼              │
//!   │                                                 ┌──────────────────┐    │
//!   │                                                 │ notifier worker  │────┼──▶ gateway
//!   │                                                 └──────────────────┘    │
//!   └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use bridge_watchdog::config::load_config;
use bridge_watchdog::lifecycle::{self, wait_for_signal};
use bridge_watchdog::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "bridge-watchdog")]
#[command(about = "Self-healing watchdog for the trading-data bridge", long_about = None)]
struct Args {
    /// TOML configuration file; defaults and WATCHDOG_* variables apply without it
    #[arg(short, long, env = "WATCHDOG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("bridge-watchdog v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bridge = %config.bridge.base_url,
        check_interval_secs = config.watchdog.check_interval_secs,
        failure_threshold = config.watchdog.failure_threshold,
        healing_cooldown_secs = config.watchdog.healing_cooldown_secs,
        verification_delay_secs = config.watchdog.verification_delay_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let running = lifecycle::start(&config).await?;
    wait_for_signal().await;
    running.stop().await;

    Ok(())
}
