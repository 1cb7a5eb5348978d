use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;

use rpc_balancer::config::loader::ENV_CLIENT_ADDRESS;
use rpc_balancer::net::tls;
use rpc_balancer::protocol::RpcRequest;
use rpc_balancer::RpcClient;

#[derive(Parser)]
#[command(name = "rpc-call")]
#[command(about = "Send one RPC call through the balancer", long_about = None)]
struct Cli {
    /// Balancer client address.
    #[arg(short, long, env = ENV_CLIENT_ADDRESS, default_value = "localhost:8080")]
    address: String,

    /// PEM certificate to trust; enables TLS.
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Server name to verify when TLS is enabled.
    #[arg(long, default_value = "localhost")]
    server_name: String,

    /// Per-step timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Method name, e.g. Add.
    method: String,

    /// Params as JSON, e.g. '{"a":1,"b":2}'. Omitted from the call when absent.
    params: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut request = RpcRequest::new(cli.method);
    if let Some(raw) = &cli.params {
        request = request.with_params(serde_json::from_str::<Value>(raw)?);
    }

    let mut client = RpcClient::new(cli.address).with_timeout(Duration::from_millis(cli.timeout_ms));
    if let Some(ca) = &cli.ca {
        let connector = tls::load_connector(ca)?;
        client = client.with_tls(connector, tls::server_name(&cli.server_name)?);
    }

    let response = client.call_raw(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
