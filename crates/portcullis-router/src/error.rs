//! Route table construction errors.

use thiserror::Error;

/// A malformed route pattern or registration.
///
/// Compile errors are raised while the route table is being built and are
/// fatal: a router that failed to compile is never served.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A wildcard appeared somewhere other than the final segment.
    #[error("wildcard must be the last segment in pattern `{pattern}`")]
    WildcardNotLast {
        /// The offending pattern
        pattern: String,
    },

    /// The same parameter name was bound twice in one pattern.
    #[error("duplicate parameter `{name}` in pattern `{pattern}`")]
    DuplicateParam {
        /// The offending pattern
        pattern: String,
        /// The repeated parameter name
        name: String,
    },

    /// A `{name:RE}` constraint failed to compile.
    #[error("invalid regex for parameter `{name}` in pattern `{pattern}`: {source}")]
    InvalidRegex {
        /// The offending pattern
        pattern: String,
        /// The parameter carrying the regex
        name: String,
        /// The underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A `{` was never closed.
    #[error("unterminated parameter in pattern `{pattern}`")]
    UnterminatedParam {
        /// The offending pattern
        pattern: String,
    },

    /// A parameter name was empty or contained characters outside `[A-Za-z0-9_]`.
    #[error("invalid parameter name `{name}` in pattern `{pattern}`")]
    InvalidParamName {
        /// The offending pattern
        pattern: String,
        /// The rejected name
        name: String,
    },

    /// A parameter or wildcard token shared its segment with literal text.
    #[error("segment `{segment}` mixes a parameter with literal text in pattern `{pattern}`")]
    MixedSegment {
        /// The offending pattern
        pattern: String,
        /// The segment that could not be classified
        segment: String,
    },

    /// Two wildcards with different names were registered at the same position.
    #[error("wildcard `*{name}` in pattern `{pattern}` conflicts with existing `*{existing}`")]
    WildcardConflict {
        /// The offending pattern
        pattern: String,
        /// The new wildcard name
        name: String,
        /// The wildcard name already registered at that position
        existing: String,
    },

    /// A route was registered without a terminal handler.
    #[error("route `{method} {pattern}` has no handler")]
    MissingHandler {
        /// The offending pattern
        pattern: String,
        /// The method the route was registered for
        method: String,
    },
}

impl CompileError {
    /// Returns the pattern the error was raised for.
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::WildcardNotLast { pattern }
            | Self::DuplicateParam { pattern, .. }
            | Self::InvalidRegex { pattern, .. }
            | Self::UnterminatedParam { pattern }
            | Self::InvalidParamName { pattern, .. }
            | Self::MixedSegment { pattern, .. }
            | Self::WildcardConflict { pattern, .. }
            | Self::MissingHandler { pattern, .. } => pattern,
        }
    }
}
