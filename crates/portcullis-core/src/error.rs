//! Error taxonomy.
//!
//! | Variant          | Raised by                | Status | Fatal |
//! |------------------|--------------------------|--------|-------|
//! | `Compile`        | route registration       | n/a    | yes   |
//! | `NoMatch`        | tree lookup              | 404    | no    |
//! | `AccessDenied`   | access gates             | 400/401/403 | no |
//! | `HandlerFault`   | fault recovery           | 500    | no    |
//! | `Write`          | response writer          | n/a    | no    |
//!
//! Only `Compile` stops the process, and only before the first request.

use http::StatusCode;
use portcullis_router::CompileError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::response::WriteError;

/// Result type alias using [`PortcullisError`].
pub type PortcullisResult<T> = Result<T, PortcullisError>;

/// Coarse classification of an error, used for metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad route table.
    Configuration,
    /// No route for the request.
    NotFound,
    /// Rejected by an access gate.
    Authorization,
    /// A handler or middleware faulted.
    Internal,
    /// The client connection failed.
    Connection,
}

impl ErrorCategory {
    /// Returns the label used in metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::NotFound => "not_found",
            Self::Authorization => "authorization",
            Self::Internal => "internal",
            Self::Connection => "connection",
        }
    }
}

/// Errors surfaced by the router and pipeline.
#[derive(Error, Debug)]
pub enum PortcullisError {
    /// The route table could not be built.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// No route serves the request.
    #[error("no route for {method} {path}")]
    NoMatch {
        /// Request method
        method: String,
        /// Request path
        path: String,
    },

    /// An access gate rejected the request.
    #[error("access denied by {gate}: {reason}")]
    AccessDenied {
        /// Status the gate responds with
        status: StatusCode,
        /// Gate that rejected the request
        gate: &'static str,
        /// Text shown to the client
        reason: String,
    },

    /// A handler or middleware panicked.
    #[error("handler fault: {message}")]
    HandlerFault {
        /// Panic payload rendered as text
        message: String,
    },

    /// The response could not be written.
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl PortcullisError {
    /// Creates an access denial.
    #[must_use]
    pub fn access_denied(status: StatusCode, gate: &'static str, reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            status,
            gate,
            reason: reason.into(),
        }
    }

    /// Creates a 403 access denial.
    #[must_use]
    pub fn forbidden(gate: &'static str, reason: impl Into<String>) -> Self {
        Self::access_denied(StatusCode::FORBIDDEN, gate, reason)
    }

    /// Creates a 400 access denial.
    #[must_use]
    pub fn bad_request(gate: &'static str, reason: impl Into<String>) -> Self {
        Self::access_denied(StatusCode::BAD_REQUEST, gate, reason)
    }

    /// Creates a no-match error.
    #[must_use]
    pub fn no_match(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NoMatch {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Compile(_) => ErrorCategory::Configuration,
            Self::NoMatch { .. } => ErrorCategory::NotFound,
            Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::HandlerFault { .. } => ErrorCategory::Internal,
            Self::Write(_) => ErrorCategory::Connection,
        }
    }

    /// Returns the HTTP status this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoMatch { .. } => StatusCode::NOT_FOUND,
            Self::AccessDenied { status, .. } => *status,
            Self::Compile(_) | Self::HandlerFault { .. } | Self::Write(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the text safe to show a client in production.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::AccessDenied { reason, .. } => reason.clone(),
            _ => self
                .status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        }
    }
}
