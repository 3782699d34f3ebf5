//! Configuration sections.
//!
//! Every section rejects unknown keys and fills missing ones from its
//! defaults, so a file only has to name what it changes.

use serde::{Deserialize, Serialize};

/// Whether the process runs for development or production.
///
/// Development exposes panic messages and backtraces in fault responses and
/// logs in pretty format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Local development.
    Dev,
    /// Production.
    #[default]
    Prod,
}

impl RunMode {
    /// Returns true in development mode.
    #[must_use]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Request matching behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouterSection {
    /// Serve `HEAD` from a `GET` route with the body suppressed.
    #[serde(default = "default_true")]
    pub head_from_get: bool,

    /// Remove trailing slashes before matching.
    #[serde(default = "default_true")]
    pub strip_slashes: bool,

    /// Emit one log line per served request.
    #[serde(default = "default_true")]
    pub access_log: bool,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            head_from_get: true,
            strip_slashes: true,
            access_log: true,
        }
    }
}

/// Paths and cookie names used by the sign-in gates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// Sub-path the application is mounted under, e.g. `/git`. Empty for none.
    #[serde(default)]
    pub app_sub_url: String,

    /// Sign-in page.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Page a user who must change their password is sent to.
    #[serde(default = "default_change_password_path")]
    pub change_password_path: String,

    /// Cookie carrying the URI to return to after sign-in.
    #[serde(default = "default_redirect_cookie")]
    pub redirect_cookie: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            app_sub_url: String::new(),
            login_path: default_login_path(),
            change_password_path: default_change_password_path(),
            redirect_cookie: default_redirect_cookie(),
        }
    }
}

impl AuthSection {
    /// Sign-in URL including the sub-path.
    #[must_use]
    pub fn login_url(&self) -> String {
        format!("{}{}", self.app_sub_url, self.login_path)
    }

    /// Change-password URL including the sub-path.
    #[must_use]
    pub fn change_password_url(&self) -> String {
        format!("{}{}", self.app_sub_url, self.change_password_path)
    }

    /// Home URL including the sub-path.
    #[must_use]
    pub fn home_url(&self) -> String {
        format!("{}/", self.app_sub_url)
    }
}

fn default_login_path() -> String {
    "/user/login".to_string()
}

fn default_change_password_path() -> String {
    "/user/settings/change_password".to_string()
}

fn default_redirect_cookie() -> String {
    "redirect_to".to_string()
}

/// Site-wide feature switches consulted by the gates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    /// Anonymous visitors must sign in to view anything.
    #[serde(default)]
    pub require_sign_in_view: bool,

    /// Anonymous visitors must sign in to use the explore pages.
    #[serde(default)]
    pub explore_require_sign_in_view: bool,

    /// OpenID sign-in is offered.
    #[serde(default)]
    pub enable_openid_sign_in: bool,

    /// OpenID sign-up is offered.
    #[serde(default)]
    pub enable_openid_sign_up: bool,

    /// The milestones dashboard page is served.
    #[serde(default = "default_true")]
    pub show_milestones_dashboard_page: bool,

    /// Webhook settings pages are hidden.
    #[serde(default)]
    pub disable_webhooks: bool,

    /// Captcha routes are served.
    #[serde(default)]
    pub enable_captcha: bool,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            require_sign_in_view: false,
            explore_require_sign_in_view: false,
            enable_openid_sign_in: false,
            enable_openid_sign_up: false,
            show_milestones_dashboard_page: true,
            disable_webhooks: false,
            enable_captcha: false,
        }
    }
}

/// Listener settings for the bundled server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address, e.g. `0.0.0.0:3000`.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest request body read into memory, in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1_048_576
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directive, e.g. `info` or `portcullis=debug,hyper=warn`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Json,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl From<&LoggingSection> for portcullis_telemetry::LogConfig {
    fn from(section: &LoggingSection) -> Self {
        let base = match section.format {
            LogFormat::Json => Self::production(),
            LogFormat::Pretty => Self::development(),
        };
        Self {
            level: section.level.clone(),
            ..base
        }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Record metrics and serve them.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path the Prometheus text format is served on.
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl From<&MetricsSection> for portcullis_telemetry::MetricsConfig {
    fn from(section: &MetricsSection) -> Self {
        Self {
            enabled: section.enabled,
            path: section.path.clone(),
            ..Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}
