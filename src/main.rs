//! Homewatch Server
//!
//! Run with: cargo run
//!
//! Environment variables (a `.env` file in the working directory is also read):
//! - HOMEWATCH_HOST: Bind address (default: 0.0.0.0)
//! - HOMEWATCH_PORT: Port number (default: 8080)
//! - GOHOME_DB_URL: Postgres readings database (default: in-memory store)
//! - HOMEWATCH_DB_MAX_CONNECTIONS: Pool size (default: 5)
//! - RUST_LOG: Log level (default: info)
//!
//! Alert evaluation runs separately: see `cargo run --bin alert_pass`.

use homewatch::api::{run_server, ServerConfig};
use homewatch::config::load_dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homewatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!("Homewatch configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    match config.database_url {
        Some(_) => tracing::info!(
            "  Store: Postgres (max {} connections)",
            config.max_connections
        ),
        None => tracing::info!("  Store: in-memory"),
    }

    run_server(config).await
}
