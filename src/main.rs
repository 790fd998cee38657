use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ai_gateway::config::GatewayConfig;
use ai_gateway::server::{self, GatewayState};

#[derive(Parser)]
#[command(name = "ai-gateway", about = "AI chat gateway for the job board")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ai_gateway=info,tower_http=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = GatewayConfig::from_env()?;
    let state = Arc::new(GatewayState::new(config)?);

    server::serve(state, cli.addr).await?;
    Ok(())
}
