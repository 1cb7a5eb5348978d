use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_balancer::backend::{HeartbeatSender, Service};
use rpc_balancer::config::loader::ENV_HEARTBEAT_ADDRESS;
use rpc_balancer::lifecycle::{shutdown_signal, Shutdown};
use rpc_balancer::observability::logging;

#[derive(Parser)]
#[command(name = "rpc-backend")]
#[command(about = "Arithmetic RPC backend that registers itself with a balancer", long_about = None)]
struct Cli {
    /// Port to serve RPC requests on.
    #[arg(short, long, default_value = "8081")]
    port: u16,

    /// Balancer heartbeat address.
    #[arg(short, long, env = ENV_HEARTBEAT_ADDRESS, default_value = "localhost:7070")]
    balancer: String,

    /// Milliseconds between heartbeats.
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let listener = TcpListener::bind(("0.0.0.0", cli.port)).await?;
    let port = listener.local_addr()?.port();
    tracing::info!(port, "Backend started");

    let shutdown = Shutdown::new();
    let server = tokio::spawn(Service::arithmetic().serve(listener, shutdown.subscribe()));

    let heartbeats = HeartbeatSender::new(cli.balancer, port.to_string())
        .with_interval(Duration::from_millis(cli.interval_ms));

    tokio::select! {
        result = heartbeats.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Balancer is down");
            }
        }
        _ = shutdown_signal() => {}
    }

    shutdown.trigger();
    // Let requests already accepted finish.
    tokio::time::sleep(Duration::from_secs(1)).await;
    server.await?;
    tracing::info!("Backend stopped");
    Ok(())
}
