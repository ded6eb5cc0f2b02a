//! Request counting middleware keyed by matched route and status code.
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use axum::extract::MatchedPath;
use axum::http::Request;
use mediadrop_telemetry::{Metrics, set_request_context, with_request_context};
use tower::{Layer, Service};

use crate::http::constants::HEADER_REQUEST_ID;

/// Route label for requests that matched no route, so scanners cannot blow
/// up the label cardinality.
const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Clone)]
pub(crate) struct HttpMetricsLayer {
    metrics: Metrics,
}

impl HttpMetricsLayer {
    pub(crate) const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for HttpMetricsLayer {
    type Service = HttpMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpMetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct HttpMetricsService<S> {
    inner: S,
    metrics: Metrics,
}

impl<S, B> Service<Request<B>> for HttpMetricsService<S>
where
    S: Service<Request<B>, Response = axum::response::Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| UNMATCHED_ROUTE.to_string(), |matched| matched.as_str().to_string());
        let request_id = req
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        set_request_context(&tracing::Span::current(), request_id.as_str(), route.as_str());
        let metrics = self.metrics.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            with_request_context(request_id, route.clone(), async move {
                let response = fut.await?;
                metrics.inc_http_request(&route, response.status().as_u16());
                Ok(response)
            })
            .await
        })
    }
}
