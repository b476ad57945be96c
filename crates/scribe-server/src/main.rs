//! # Scribe Server
//!
//! Realtime collaborative text-editing relay.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! scribe
//!
//! # Run with a specific config file
//! SCRIBE_CONFIG=/path/to/scribe.toml scribe
//!
//! # Run with environment variables
//! SCRIBE_PORT=8080 SCRIBE_HOST=0.0.0.0 scribe
//! ```

use anyhow::Result;
use scribe_server::{config, handlers, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe_server=debug,scribe_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Scribe server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
