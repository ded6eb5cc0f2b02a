//! Span and request context helpers.
//!
//! Request identifiers and matched routes live in task-local storage so
//! metric layers and handlers can read them without threading extra arguments.

use std::future::Future;
use std::sync::Arc;

use tracing::{Span, span::Entered};

use crate::init::build_version;

/// Keeps the process-level span entered for the lifetime of the guard.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the `app` span tagged with the service name and build version.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "app",
            service = %service,
            build = %build_version()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}

/// Record request identifiers on a span created with empty fields.
pub fn set_request_context(span: &Span, request_id: impl Into<String>, route: impl Into<String>) {
    let request_id = request_id.into();
    let route = route.into();
    span.record("request_id", tracing::field::display(&request_id));
    span.record("route", tracing::field::display(&route));
}

/// Request identifier of the task currently serving a request.
#[must_use]
pub fn current_request_id() -> Option<String> {
    ACTIVE_REQUEST_CONTEXT
        .try_with(|ctx| ctx.request_id.to_string())
        .ok()
}

/// Matched route of the task currently serving a request.
#[must_use]
pub fn current_route() -> Option<String> {
    ACTIVE_REQUEST_CONTEXT
        .try_with(|ctx| ctx.route.to_string())
        .ok()
}

/// Run `fut` with the supplied request context in scope.
pub async fn with_request_context<Fut, T>(
    request_id: impl Into<String>,
    route: impl Into<String>,
    fut: Fut,
) -> T
where
    Fut: Future<Output = T>,
{
    let context = RequestContext {
        request_id: Arc::from(request_id.into()),
        route: Arc::from(route.into()),
    };
    ACTIVE_REQUEST_CONTEXT.scope(context, fut).await
}

#[derive(Clone)]
struct RequestContext {
    request_id: Arc<str>,
    route: Arc<str>,
}

tokio::task_local! {
    static ACTIVE_REQUEST_CONTEXT: RequestContext;
}
