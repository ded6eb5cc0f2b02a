//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use chrono::{SecondsFormat, Utc};
use mediadrop_telemetry::{MetricsSnapshot, build_version};
use serde::Serialize;
use systemstat::{Platform, System};
use tracing::{debug, error};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Host-wide memory figures; not the footprint of this process.
#[derive(Debug, Serialize)]
pub(crate) struct SystemMemoryReport {
    pub(crate) total_bytes: u64,
    pub(crate) free_bytes: u64,
    pub(crate) used_bytes: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) timestamp: String,
    pub(crate) uptime: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_memory: Option<SystemMemoryReport>,
    pub(crate) version: &'static str,
    pub(crate) degraded: Vec<String>,
    pub(crate) streams: MetricsSnapshot,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let mut degraded = Vec::new();
    let scratch_ok = tokio::fs::metadata(state.scratch.root())
        .await
        .is_ok_and(|meta| meta.is_dir());
    if !scratch_ok {
        degraded.push("scratch".to_string());
    }

    Json(HealthResponse {
        status: if degraded.is_empty() {
            "healthy"
        } else {
            "degraded"
        },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
        system_memory: system_memory_report(),
        version: build_version(),
        degraded,
        streams: state.telemetry.snapshot(),
    })
}

fn system_memory_report() -> Option<SystemMemoryReport> {
    match System::new().memory() {
        Ok(memory) => {
            let total_bytes = memory.total.as_u64();
            let free_bytes = memory.free.as_u64();
            Some(SystemMemoryReport {
                total_bytes,
                free_bytes,
                used_bytes: total_bytes.saturating_sub(free_bytes),
            })
        }
        Err(err) => {
            debug!(error = %err, "memory statistics unavailable");
            None
        }
    }
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
