//! `POST /fetch`: run the fetch pipeline for a URL.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use mediadrop_pipeline::FetchRequest;
use tracing::{info, warn};

use crate::http::errors::ApiError;
use crate::models::{FetchRequestBody, FetchResponse};
use crate::state::ApiState;

const GENERIC_PLATFORM: &str = "generic";

pub(crate) async fn fetch_media(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<FetchRequestBody>, JsonRejection>,
) -> Result<Json<FetchResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(error = %rejection, "rejected fetch body");
        ApiError::bad_request("URL is required")
    })?;
    let Some(url) = body.url.filter(|url| !url.trim().is_empty()) else {
        return Err(ApiError::bad_request("URL is required"));
    };
    let platform = body
        .platform
        .filter(|platform| !platform.trim().is_empty())
        .unwrap_or_else(|| GENERIC_PLATFORM.to_string());

    let descriptor = state
        .orchestrator
        .fetch(FetchRequest {
            url: url.trim().to_string(),
            platform,
        })
        .await
        .map_err(|err| {
            warn!(error = %err, platform = err.platform().unwrap_or_default(), "fetch failed");
            ApiError::from(err)
        })?;
    info!(
        fetch_id = %descriptor.fetch_id,
        artifact = %descriptor.artifact,
        size = %descriptor.size,
        "fetch completed"
    );
    Ok(Json(FetchResponse::from(descriptor)))
}
