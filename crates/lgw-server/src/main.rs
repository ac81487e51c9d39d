use std::path::PathBuf;

use clap::Parser;
use lgw_server::{telemetry, GatewayConfig, GatewayServer, Services};

/// Ledger command gateway.
#[derive(Parser, Debug)]
#[command(name = "lgw-server", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "LGW_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;
    telemetry::init(&config.log)?;

    let services = Services::from_config(&config, lgw_licensing::dictionary()).await?;
    GatewayServer::new(config, services).serve().await?;
    Ok(())
}
