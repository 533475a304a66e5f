//! pairhub server entry point.
//!
//! Starts the hub coordinator and the Axum HTTP server with REST and
//! WebSocket endpoints.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pairhub::api;
use pairhub::app_state::AppState;
use pairhub::config::{LogFormat, ServerConfig};
use pairhub::hub::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting pairhub");

    // Start the hub coordinator
    let (hub, hub_task) = Hub::spawn(config.hub_command_capacity);

    // Build application state
    let listen_addr = config.listen_addr;
    let app_state = AppState {
        hub: hub.clone(),
        config: Arc::new(config),
    };

    // Build router
    let app = api::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    hub_task.await?;
    tracing::info!("server stopped");

    Ok(())
}

/// Resolves on Ctrl-C after stopping the hub.
///
/// Upgraded sockets are not tracked by the HTTP server's graceful shutdown;
/// closing their queues makes each writer send a close frame and exit.
async fn shutdown_signal(hub: Hub) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
    hub.shutdown().await;
}
