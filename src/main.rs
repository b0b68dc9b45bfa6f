//! message-catalog server binary.
//!
//! Loads the catalog once, then serves it to every client until the
//! process is killed. Startup failures exit with a non-zero status.

use message_catalog::catalog::Catalog;
use message_catalog::config::Config;
use message_catalog::server::Server;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        catalog = %config.catalog_path.display(),
        max_connections = ?config.max_connections,
        "Starting message-catalog server"
    );

    let catalog = Arc::new(Catalog::load(&config.catalog_path)?);

    Server::new(config, catalog).run().await?;
    Ok(())
}
