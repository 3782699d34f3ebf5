//! Layered settings loader.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, RunMode, Settings};

/// Loads [`Settings`] from layered sources.
///
/// Later layers override earlier ones:
/// 1. Built-in defaults (or a preset)
/// 2. A TOML or JSON file
/// 3. Environment variables `PREFIX__SECTION__KEY`
///
/// # Example
///
/// ```no_run
/// use portcullis_config::ConfigLoader;
///
/// # fn main() -> Result<(), portcullis_config::ConfigError> {
/// let settings = ConfigLoader::new()
///     .with_optional_file("portcullis.toml")?
///     .with_env_prefix("PORTCULLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    settings: Settings,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.settings = Settings::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.settings = Settings::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// Sections missing from the file take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, malformed, has an unknown
    /// extension or contains unknown keys.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::missing(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        self.settings = parse(&content, &extension)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads settings from a string in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Fails if the content is malformed or the format unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::ConfigLoader;
    ///
    /// let settings = ConfigLoader::new()
    ///     .with_string("[service]\nrequire_sign_in_view = true", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(settings.service.require_sign_in_view);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.settings = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Enables environment overrides under `PREFIX__`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable environment value or invalid settings.
    pub fn load(mut self) -> Result<Settings, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> =
                env::vars().filter(|(k, _)| k.starts_with(&prefix)).collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.settings.validate()?;
        Ok(self.settings)
    }

    /// Returns the settings without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> Settings {
        self.settings
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let flag = || parse_bool(value).ok_or_else(|| ConfigError::bad_env(key, "expected boolean"));
        let s = &mut self.settings;

        match parts.as_slice() {
            ["RUN_MODE"] => {
                s.run_mode = match value.to_lowercase().as_str() {
                    "dev" => RunMode::Dev,
                    "prod" => RunMode::Prod,
                    _ => return Err(ConfigError::bad_env(key, "expected 'dev' or 'prod'")),
                };
            }

            ["ROUTER", "HEAD_FROM_GET"] => s.router.head_from_get = flag()?,
            ["ROUTER", "STRIP_SLASHES"] => s.router.strip_slashes = flag()?,
            ["ROUTER", "ACCESS_LOG"] => s.router.access_log = flag()?,

            ["AUTH", "APP_SUB_URL"] => s.auth.app_sub_url = value.to_string(),
            ["AUTH", "LOGIN_PATH"] => s.auth.login_path = value.to_string(),
            ["AUTH", "CHANGE_PASSWORD_PATH"] => s.auth.change_password_path = value.to_string(),
            ["AUTH", "REDIRECT_COOKIE"] => s.auth.redirect_cookie = value.to_string(),

            ["SERVICE", "REQUIRE_SIGN_IN_VIEW"] => s.service.require_sign_in_view = flag()?,
            ["SERVICE", "EXPLORE_REQUIRE_SIGN_IN_VIEW"] => {
                s.service.explore_require_sign_in_view = flag()?;
            }
            ["SERVICE", "ENABLE_OPENID_SIGN_IN"] => s.service.enable_openid_sign_in = flag()?,
            ["SERVICE", "ENABLE_OPENID_SIGN_UP"] => s.service.enable_openid_sign_up = flag()?,
            ["SERVICE", "SHOW_MILESTONES_DASHBOARD_PAGE"] => {
                s.service.show_milestones_dashboard_page = flag()?;
            }
            ["SERVICE", "DISABLE_WEBHOOKS"] => s.service.disable_webhooks = flag()?,
            ["SERVICE", "ENABLE_CAPTCHA"] => s.service.enable_captcha = flag()?,

            ["SERVER", "HTTP_ADDR"] => s.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                s.server.shutdown_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::bad_env(key, "expected integer"))?;
            }
            ["SERVER", "MAX_BODY_SIZE"] => {
                s.server.max_body_size = value
                    .parse()
                    .map_err(|_| ConfigError::bad_env(key, "expected integer"))?;
            }

            ["LOGGING", "LEVEL"] => s.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                s.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::bad_env(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            ["METRICS", "ENABLED"] => s.metrics.enabled = flag()?,
            ["METRICS", "PATH"] => s.metrics.path = value.to_string(),

            // Unknown keys are left for other consumers of the prefix.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<Settings, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
