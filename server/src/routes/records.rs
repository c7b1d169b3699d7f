//! Catalog endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use beanline_engine::{FieldChange, Record};

use crate::error::Result;
use crate::handlers::{handle_create, handle_get, handle_list, handle_mutate};
use crate::AppState;

/// Create record routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/records", get(list_handler).post(create_handler))
        .route("/records/{id}", get(get_handler).patch(mutate_handler))
}

/// GET /records - Every record, newest first.
async fn list_handler(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(handle_list(&state.store))
}

/// GET /records/{id}
async fn get_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Record>> {
    Ok(Json(handle_get(&state.store, &id)?))
}

/// POST /records - Insert a generated record.
async fn create_handler(State(state): State<AppState>) -> Result<(StatusCode, Json<Record>)> {
    let record = handle_create(&state.store).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PATCH /records/{id} - Apply one field change.
async fn mutate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(change): Json<FieldChange>,
) -> Result<Json<Record>> {
    Ok(Json(handle_mutate(&state.store, &id, change).await?))
}
