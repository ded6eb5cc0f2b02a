//! # Design
//!
//! - One crate-level error type for server bind/serve failures.
//! - Constant messages; the address and IO source travel as fields.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

/// Result alias for API server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Errors raised while binding or serving the API.
#[derive(Debug)]
pub enum ApiServerError {
    /// Binding the API listener failed.
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Serving the API failed.
    Serve {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl Display for ApiServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { .. } => formatter.write_str("failed to bind api listener"),
            Self::Serve { .. } => formatter.write_str("api server terminated unexpectedly"),
        }
    }
}

impl Error for ApiServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Serve { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn messages_are_constant_and_sources_preserved() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
        let err = ApiServerError::Bind {
            addr,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "failed to bind api listener");
        assert!(err.source().is_some());

        let serve = ApiServerError::Serve {
            source: io::Error::other("boom"),
        };
        assert_eq!(serve.to_string(), "api server terminated unexpectedly");
    }
}
