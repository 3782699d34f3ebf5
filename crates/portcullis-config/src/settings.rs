//! The root [`Settings`] snapshot.
//!
//! Settings are loaded once, validated, then shared read-only (usually as an
//! `Arc<Settings>`) with the router and every gate that needs them.

use serde::{Deserialize, Serialize};

use crate::{
    AuthSection, ConfigError, LogFormat, LoggingSection, MetricsSection, RouterSection, RunMode,
    ServerSection, ServiceSection,
};

/// Complete Portcullis configuration.
///
/// # Example
///
/// ```
/// use portcullis_config::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.router.head_from_get);
/// assert_eq!(settings.auth.login_path, "/user/login");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Development or production.
    #[serde(default)]
    pub run_mode: RunMode,

    /// Request matching behaviour.
    #[serde(default)]
    pub router: RouterSection,

    /// Sign-in paths and cookies.
    #[serde(default)]
    pub auth: AuthSection,

    /// Site feature switches.
    #[serde(default)]
    pub service: ServiceSection,

    /// Listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Settings {
    /// Creates a settings builder.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Development preset: dev run mode, pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            run_mode: RunMode::Dev,
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            ..Self::default()
        }
    }

    /// Production preset: the defaults.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::invalid("server.max_body_size", "must be greater than zero"));
        }

        portcullis_telemetry::logging::create_env_filter(&self.logging.level)
            .map_err(|e| ConfigError::invalid("logging.level", e.to_string()))?;

        let sub_url = &self.auth.app_sub_url;
        if !sub_url.is_empty() && (!sub_url.starts_with('/') || sub_url.ends_with('/')) {
            return Err(ConfigError::invalid(
                "auth.app_sub_url",
                "must be empty or start with '/' and not end with '/'",
            ));
        }

        for (field, path) in [
            ("auth.login_path", &self.auth.login_path),
            ("auth.change_password_path", &self.auth.change_password_path),
            ("metrics.path", &self.metrics.path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(field, "must start with '/'"));
            }
        }

        if self.auth.redirect_cookie.is_empty() {
            return Err(ConfigError::invalid(
                "auth.redirect_cookie",
                "must not be empty",
            ));
        }

        Ok(())
    }

    /// Telemetry configuration derived from the logging and metrics sections.
    #[must_use]
    pub fn telemetry(&self) -> portcullis_telemetry::TelemetryConfig {
        portcullis_telemetry::TelemetryConfig {
            logging: (&self.logging).into(),
            metrics: (&self.metrics).into(),
        }
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Sets the run mode.
    #[must_use]
    pub fn run_mode(mut self, run_mode: RunMode) -> Self {
        self.settings.run_mode = run_mode;
        self
    }

    /// Sets the router section.
    #[must_use]
    pub fn router(mut self, router: RouterSection) -> Self {
        self.settings.router = router;
        self
    }

    /// Sets the auth section.
    #[must_use]
    pub fn auth(mut self, auth: AuthSection) -> Self {
        self.settings.auth = auth;
        self
    }

    /// Sets the service section.
    #[must_use]
    pub fn service(mut self, service: ServiceSection) -> Self {
        self.settings.service = service;
        self
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.settings.server = server;
        self
    }

    /// Sets the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.settings.logging = logging;
        self
    }

    /// Sets the metrics section.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsSection) -> Self {
        self.settings.metrics = metrics;
        self
    }

    /// Returns the settings without validating them.
    #[must_use]
    pub fn build(self) -> Settings {
        self.settings
    }
}
