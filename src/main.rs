//! connect4-gateway server entry point.
//!
//! Starts the Axum server with the WebSocket game endpoint and the HTTP
//! system endpoints.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use connect4_gateway::app_state::AppState;
use connect4_gateway::config::{GatewayConfig, LogFormat};
use connect4_gateway::domain::SessionRegistry;
use connect4_gateway::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting connect4-gateway");

    // Build domain layer
    let registry = Arc::new(SessionRegistry::with_token_bytes(config.token_bytes));
    let app_state = AppState::new(registry).with_queue_capacity(config.queue_capacity);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    server::serve(listener, app_state, server::shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}
