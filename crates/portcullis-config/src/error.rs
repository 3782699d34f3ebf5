//! Errors raised while loading or validating [`Settings`](crate::Settings).

use std::path::PathBuf;
use thiserror::Error;

/// A settings source could not be used, or the merged snapshot is invalid.
///
/// Every variant is fatal at startup; the router never sees a partially
/// loaded snapshot.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested settings file does not exist.
    #[error("settings file {} does not exist", path.display())]
    Missing {
        /// The requested path
        path: PathBuf,
    },

    /// The settings file exists but could not be read.
    #[error("cannot read settings file {}", path.display())]
    Unreadable {
        /// The file
        path: PathBuf,
        /// The I/O failure
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax error, or a key the schema does not know.
    #[error("bad TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax error, or a key the schema does not know.
    #[error("bad JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value `validate()` rejects.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted path, e.g. `auth.login_path`
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A `PREFIX__SECTION__KEY` variable is unknown or does not parse.
    #[error("environment override {var}: {reason}")]
    BadEnv {
        /// Variable name
        var: String,
        /// What is wrong with it
        reason: String,
    },

    /// Neither `toml` nor `json`.
    #[error("unsupported settings format '{0}' (expected toml or json)")]
    UnsupportedFormat(String),
}

impl ConfigError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::Missing { path: path.into() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadEnv {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Returns the dotted field name for validation failures.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConfigError::missing("/etc/portcullis/app.toml");
        assert_eq!(err.to_string(), "settings file /etc/portcullis/app.toml does not exist");

        let err = ConfigError::invalid("auth.login_path", "must start with '/'");
        assert_eq!(err.to_string(), "auth.login_path: must start with '/'");
        assert_eq!(err.field(), Some("auth.login_path"));

        let err = ConfigError::bad_env("PORTCULLIS__ROUTER__HEAD_FROM_GET", "expected boolean");
        assert_eq!(
            err.to_string(),
            "environment override PORTCULLIS__ROUTER__HEAD_FROM_GET: expected boolean"
        );
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_unreadable_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::unreadable("/root/app.toml", io);
        assert!(err.source().is_some());
    }
}
