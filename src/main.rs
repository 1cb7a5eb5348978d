//! RPC load balancer
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 RPC LOAD BALANCER                │
//!     Backend            │  ┌───────────┐    ┌──────────┐    ┌───────────┐  │
//!     heartbeats ────────┼─▶│ heartbeat │───▶│ registry │◀───│  health   │  │
//!                        │  │ listener  │    │  (pool)  │    │  monitor  │  │
//!                        │  └───────────┘    └────┬─────┘    └───────────┘  │
//!                        │                        │ round robin             │
//!     Client request     │  ┌───────────┐    ┌────▼─────┐    ┌───────────┐  │
//!     ───────────────────┼─▶│ listener  │───▶│ request  │───▶│   dial    │──┼──▶ Backend
//!     ◀──────────────────┼──│ (+TLS)    │◀───│ handler  │◀───│  + relay  │◀─┼─── Server
//!                        │  └───────────┘    └──────────┘    └───────────┘  │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use rpc_balancer::config::loader;
use rpc_balancer::lifecycle::{shutdown_signal, Balancer};
use rpc_balancer::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "rpc-balancer")]
#[command(about = "Heartbeat-driven round-robin load balancer for JSON RPC", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = loader::load(cli.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("rpc-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let balancer = Balancer::bind(config).await?;
    balancer.run_until(shutdown_signal()).await?;

    Ok(())
}
