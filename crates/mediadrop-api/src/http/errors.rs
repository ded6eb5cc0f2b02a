//! JSON API error wrapper.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CONTENT_RANGE},
    response::{IntoResponse, Response},
};
use mediadrop_pipeline::FetchError;
use mediadrop_scratch::ScratchError;
use mediadrop_telemetry::{current_request_id, current_route};
use tracing::{error, warn};

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_DOWNLOAD_FAILED, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL,
    PROBLEM_METHOD_NOT_ALLOWED, PROBLEM_NOT_FOUND, PROBLEM_RANGE_NOT_SATISFIABLE,
};
use crate::models::ErrorBody;

/// Structured API error rendered as `{error, type, status}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    message: String,
    content_range: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            content_range: None,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, PROBLEM_INTERNAL, message)
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, message)
    }

    pub(crate) fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "Access denied")
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, PROBLEM_NOT_FOUND, message)
    }

    pub(crate) fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            PROBLEM_METHOD_NOT_ALLOWED,
            "Method not allowed",
        )
    }

    pub(crate) fn download_failed(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_DOWNLOAD_FAILED,
            message,
        )
    }

    pub(crate) fn range_not_satisfiable(size: u64) -> Self {
        let mut err = Self::new(
            StatusCode::RANGE_NOT_SATISFIABLE,
            PROBLEM_RANGE_NOT_SATISFIABLE,
            "Requested range not satisfiable",
        );
        err.content_range = Some(format!("bytes */{size}"));
        err
    }

    #[cfg(test)]
    pub(crate) fn message(&self) -> &str {
        &self.message
    }
}

impl From<ScratchError> for ApiError {
    fn from(err: ScratchError) -> Self {
        match &err {
            ScratchError::AccessDenied { name, reason } => {
                warn!(artifact = %name, reason, "artifact access denied");
                Self::forbidden()
            }
            ScratchError::WeakSecret { .. } | ScratchError::Io { .. } => {
                error!(error = ?err, "scratch failure");
                Self::internal("Failed to stream file")
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match &err {
            FetchError::InvalidUrl { .. } => Self::bad_request("Invalid URL format"),
            FetchError::DownloadFailed { platform, .. } => {
                Self::download_failed(format!("Failed to download from {platform}"))
            }
            FetchError::ArtifactNotFound { .. } => {
                Self::download_failed("Downloaded file not found")
            }
            FetchError::Scratch { .. } | FetchError::Inspect { .. } => {
                Self::internal("Failed to process the URL. Please try again.")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                status = self.status.as_u16(),
                request_id = %current_request_id().unwrap_or_default(),
                route = %current_route().unwrap_or_default(),
                detail = %self.message,
                "request failed"
            );
        }
        let body = ErrorBody {
            error: self.message,
            kind: self.kind.to_string(),
            status: self.status.as_u16(),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(range) = self.content_range
            && let Ok(value) = HeaderValue::from_str(&range)
        {
            response.headers_mut().insert(CONTENT_RANGE, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use mediadrop_pipeline::ToolError;
    use std::time::Duration;

    #[tokio::test]
    async fn renders_error_body_with_status() -> anyhow::Result<()> {
        let response = ApiError::not_found("File not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        assert_eq!(body.error, "File not found");
        assert_eq!(body.kind, PROBLEM_NOT_FOUND);
        assert_eq!(body.status, 404);
        Ok(())
    }

    #[test]
    fn unsatisfiable_range_carries_content_range() {
        let response = ApiError::range_not_satisfiable(42).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|value| value.to_str().ok()),
            Some("bytes */42")
        );
    }

    #[test]
    fn fetch_errors_never_leak_tool_details() {
        let err = ApiError::from(FetchError::DownloadFailed {
            platform: "youtube",
            source: ToolError::TimedOut {
                tool: mediadrop_pipeline::ToolKind::Downloader,
                timeout: Duration::from_secs(1),
            },
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Failed to download from youtube");

        let invalid = ApiError::from(FetchError::InvalidUrl { reason: "scheme" });
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    }
}
