//! Observability for Portcullis: structured logging and Prometheus metrics.
//!
//! ```text
//!  ┌──────────────────── portcullis-telemetry ───────────────────┐
//!  │                                                              │
//!  │   logging (tracing-subscriber)      metrics (metrics crate)   │
//!  │        │                                   │                  │
//!  └────────┼───────────────────────────────────┼──────────────────┘
//!           ▼                                   ▼
//!     stdout: pretty / JSON           Prometheus text on /metrics
//! ```
//!
//! The router records metrics and logs through this crate whether or not
//! anything was initialised; hosts call [`init_telemetry`] once at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::development())?;
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_gate_denial, record_not_found, record_recovered_panic, record_request,
    render_metrics, InFlightGuard, MetricsConfig, UNMATCHED_ROUTE,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined telemetry configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryConfig {
    /// Logging configuration
    pub logging: LogConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Pretty debug logs, metrics on.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns the first initialization failure.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    tracing::debug!(
        json = config.logging.json_format,
        metrics = config.metrics.enabled,
        "telemetry initialized"
    );
    Ok(())
}
