use anyhow::Context;
use settlement_reconciler::shared::LoggingUtils;
use settlement_reconciler::{AppConfig, HttpServer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first; logging settings live in it
    let config = AppConfig::load().context("Failed to load configuration")?;

    LoggingUtils::initialize(&config.logging.level, &config.logging.format)
        .context("Failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting settlement reconciler");

    let server = HttpServer::new(config)
        .await
        .context("Failed to initialize server")?;

    info!("Server starting on {}", server.config().server_address());
    server.run().await.context("Server error")?;

    Ok(())
}
