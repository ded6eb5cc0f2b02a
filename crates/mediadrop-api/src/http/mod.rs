//! HTTP handlers, middleware and router.

pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod fetch;
pub(crate) mod health;
pub(crate) mod history;
pub(crate) mod range;
pub(crate) mod router;
pub(crate) mod sse;
pub(crate) mod stream;
pub(crate) mod telemetry;
