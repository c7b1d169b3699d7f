//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub document: String,
    pub records: usize,
    pub peers: usize,
    pub connections: usize,
    pub batch_sessions: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        document: state.config.document_key.clone(),
        records: state.store.list_records().len(),
        peers: state.store.peer_count(),
        connections: state.conn_manager.connection_count(),
        batch_sessions: state.batch_sessions.len(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Beanline Sync Server"
}
