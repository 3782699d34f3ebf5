//! Server error types.

use std::io;
use std::net::SocketAddr;

use portcullis::router::CompileError;
use portcullis_config::ConfigError;
use portcullis_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while starting or running the server.
///
/// Per-request failures never surface here; the router turns them into
/// responses.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `server.http_addr` is not a socket address.
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address
        addr: String,
        /// Why it did not parse
        reason: String,
    },

    /// The listener could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address that was tried
        addr: SocketAddr,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An I/O error outside the per-connection path.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The route table did not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::InvalidAddress {
            addr: "nowhere".to_string(),
            reason: "invalid socket address syntax".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid address 'nowhere': invalid socket address syntax"
        );

        let err = ServerError::Bind {
            addr: "127.0.0.1:80".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("failed to bind to 127.0.0.1:80"));
    }
}
