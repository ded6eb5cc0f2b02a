//! `GET`/`POST /history`: recent downloads.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use mediadrop_runtime::{HistoryEntry, NewHistoryEntry};
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::models::HistoryAppendResponse;
use crate::state::ApiState;

pub(crate) async fn list_history(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    state.history.recent().await.map(Json).map_err(|err| {
        error!(error = ?err, path = %state.history.path().display(), "failed to read history");
        ApiError::internal("Failed to read history")
    })
}

pub(crate) async fn append_history(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewHistoryEntry>, JsonRejection>,
) -> Result<Json<HistoryAppendResponse>, ApiError> {
    let Json(new) = body.map_err(|rejection| {
        warn!(error = %rejection, "rejected history body");
        ApiError::bad_request("URL is required")
    })?;
    if new.url.trim().is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }
    let entry = state.history.append(new).await.map_err(|err| {
        error!(error = ?err, path = %state.history.path().display(), "failed to save history");
        ApiError::internal("Failed to save history")
    })?;
    Ok(Json(HistoryAppendResponse {
        success: true,
        entry,
    }))
}
