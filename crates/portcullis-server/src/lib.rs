//! # Portcullis Server
//!
//! Hosts a [`portcullis::Router`] on a Tokio/Hyper HTTP/1.1 listener.
//!
//! - one blocking worker per request, so handlers may block freely
//! - a connection-closed flag the pipeline observes when the client leaves
//! - graceful shutdown bounded by `server.shutdown_timeout_secs`
//! - the Prometheus text format on `metrics.path` once a recorder is installed
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portcullis_config::Settings;
//! use portcullis_server::{site, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portcullis_server::ServerError> {
//!     let settings = Arc::new(Settings::development());
//!     let server = Server::bind(site::router(settings)?).await?;
//!     server.run().await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod server;
pub mod shutdown;
pub mod site;

pub use error::ServerError;
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};

/// Crate version, printed by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
