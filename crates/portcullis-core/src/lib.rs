//! # Portcullis Core
//!
//! Per-request state and the handler contract for the Portcullis router.
//!
//! - [`RequestContext`] - parameters, data bag, identity, repository permission and response writer
//! - [`Handler`] / [`Outcome`] - the shape shared by middleware and handlers
//! - [`ResponseWriter`] - buffered response with a connection-closed signal
//! - [`CallerIdentity`], [`Permission`], [`UnitType`] - what the access gates inspect
//! - [`PortcullisError`] - the error taxonomy

#![doc(html_root_url = "https://docs.rs/portcullis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod access;
mod context;
mod error;
pub mod fixtures;
mod handler;
mod identity;
mod response;

pub use access::{AccessMode, Permission, Repository, UnitType};
pub use context::{Request, RequestContext, RequestId};
pub use error::{ErrorCategory, PortcullisError, PortcullisResult};
pub use handler::{BoxedHandler, Handler, Outcome};
pub use identity::{CallerIdentity, SignedInUser};
pub use portcullis_router::Params;
pub use response::{ConnectionState, Response, ResponseWriter, WriteError};
