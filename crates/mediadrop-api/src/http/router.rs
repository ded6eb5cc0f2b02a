//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE, header::RANGE},
    routing::{get, post},
};
use mediadrop_telemetry::build_version;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::{HEADER_LAST_EVENT_ID, HEADER_REQUEST_ID};
use crate::http::errors::ApiError;
use crate::http::fetch::fetch_media;
use crate::http::health::{health, metrics};
use crate::http::history::{append_history, list_history};
use crate::http::sse::stream_events;
use crate::http::stream::stream_artifact;
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::{ApiDependencies, ApiState};

/// Axum router wrapper hosting the fetch and stream services.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the server with its shared dependencies wired through state.
    #[must_use]
    pub fn new(deps: ApiDependencies) -> Self {
        let telemetry = deps.metrics.clone();
        let state = Arc::new(ApiState::new(deps));
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                CONTENT_TYPE,
                RANGE,
                HeaderName::from_static(HEADER_LAST_EVENT_ID),
            ]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build = %build_version(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(mediadrop_telemetry::propagate_request_id_layer())
            .layer(mediadrop_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::routes()
            .method_not_allowed_fallback(|| async { ApiError::method_not_allowed() })
            .fallback(|| async { ApiError::not_found("Not found") })
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/fetch", post(fetch_media))
            .route("/stream", get(stream_artifact))
            .route("/history", get(list_history).post(append_history))
            .route("/events", get(stream_events))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    /// Bind the API listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> ApiServerResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the server terminates unexpectedly.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "starting api");
        }
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
