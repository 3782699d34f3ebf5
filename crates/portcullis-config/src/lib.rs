//! Typed settings for the Portcullis router.
//!
//! Settings are an immutable snapshot: loaded once at startup, validated,
//! then handed to the router and the gates. Nothing reloads them.
//!
//! # Configuration File Format
//!
//! ```toml
//! run_mode = "prod"
//!
//! [router]
//! head_from_get = true
//! strip_slashes = true
//! access_log = true
//!
//! [auth]
//! app_sub_url = ""
//! login_path = "/user/login"
//! change_password_path = "/user/settings/change_password"
//! redirect_cookie = "redirect_to"
//!
//! [service]
//! require_sign_in_view = false
//! disable_webhooks = false
//!
//! [server]
//! http_addr = "0.0.0.0:3000"
//! shutdown_timeout_secs = 30
//! max_body_size = 1048576
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! path = "/metrics"
//! ```
//!
//! Environment overrides use `PREFIX__SECTION__KEY`, e.g.
//! `PORTCULLIS__SERVICE__REQUIRE_SIGN_IN_VIEW=true`.

#![doc(html_root_url = "https://docs.rs/portcullis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod loader;
mod schema;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    AuthSection, LogFormat, LoggingSection, MetricsSection, RouterSection, RunMode, ServerSection,
    ServiceSection,
};
pub use settings::{Settings, SettingsBuilder};
