//! Beanline Server - host for the replicated coffee catalog.
//!
//! This server keeps one catalog document, persists it to PostgreSQL (or
//! memory), and serves it to peers over HTTP batch sync and WebSocket using
//! the beanline-engine sync core.

mod config;
mod db;
mod error;
mod handlers;
mod host;
mod registry;
mod routes;
mod websocket;

use crate::config::Config;
use crate::handlers::BatchSessions;
use crate::registry::Registry;
use crate::websocket::ConnectionManager;
use axum::Router;
use beanline_engine::DocumentStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
    pub batch_sessions: Arc<BatchSessions>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "beanline_server=debug,beanline_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting Beanline Server on {}", addr);

    let registry = Registry::start(config).await?;

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(registry.state());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.stop();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
