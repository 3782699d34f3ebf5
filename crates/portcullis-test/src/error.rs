//! Test error types.

use thiserror::Error;

/// Errors raised while building, sending or reading a test request.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be assembled.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The response body could not be read.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The router's worker did not return.
    #[error("processing error: {0}")]
    Processing(String),

    /// The route table did not compile.
    #[error(transparent)]
    Compile(#[from] portcullis::router::CompileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            TestError::InvalidHeader("bad name".to_string()).to_string(),
            "invalid header: bad name"
        );
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(TestError::from(json).to_string().starts_with("JSON error:"));
    }
}
