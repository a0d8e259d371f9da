//! Bot host - Main Entry Point

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bothost::{HostBootstrap, HostConfig, host};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,bothost=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Bot host starting...");

    let config = HostConfig::from_env()?;
    info!("Configuration loaded ({})", config.environment);

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid BIND_ADDR: {}", config.bind_addr))?;

    let host = HostBootstrap::new(config)
        .build()
        .context("Host startup failed")?;

    host::run(host, addr).await?;

    info!("Bot host stopped");
    Ok(())
}
