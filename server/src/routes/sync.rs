//! Sync endpoint routes.
//!
//! Two transports reach the same store: batch sessions over plain HTTP and a
//! WebSocket at `/ws`.

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::handlers::{handle_websocket_connection, SyncBatch, SyncRequest};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/sessions", post(open_handler))
        .route(
            "/sync/sessions/{id}",
            post(send_handler).delete(close_handler),
        )
        .route("/ws", get(websocket_handler))
}

/// POST /sync/sessions - Open a batch session.
async fn open_handler(State(state): State<AppState>) -> (StatusCode, Json<SyncBatch>) {
    let batch = state.batch_sessions.open(&state.store).await;
    tracing::debug!(session_id = %batch.session_id, "Batch sync session opened");
    (StatusCode::CREATED, Json(batch))
}

/// POST /sync/sessions/{id} - Send one message and collect the replies.
async fn send_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncBatch>> {
    state
        .batch_sessions
        .send(&id, request.message.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("sync session {}", id)))
}

/// DELETE /sync/sessions/{id}
async fn close_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    if state.batch_sessions.close(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("sync session {}", id)))
    }
}

/// GET /ws - Upgrade to the WebSocket protocol.
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state))
}
