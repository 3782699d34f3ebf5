//! Test fixtures shared across the workspace.
//!
//! # Example
//!
//! ```
//! use portcullis_core::fixtures;
//! use portcullis_core::{AccessMode, UnitType};
//! use http::Method;
//!
//! let mut ctx = fixtures::context(Method::GET, "/alice/proj/issues");
//! ctx.set_identity(fixtures::alice());
//! ctx.set_repository(fixtures::repository(&[(UnitType::Issues, AccessMode::Read)]));
//! assert!(ctx.repository().unwrap().permission.can_read(UnitType::Issues));
//! ```

use bytes::Bytes;
use http::Method;

use crate::access::{AccessMode, Permission, Repository, UnitType};
use crate::context::{Request, RequestContext};
use crate::identity::SignedInUser;

/// Builds a request with an empty body.
///
/// # Panics
///
/// Panics if `uri` is not a valid request target.
#[must_use]
pub fn request(method: Method, uri: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .expect("fixture request must be valid")
}

/// Builds a context for an anonymous request.
#[must_use]
pub fn context(method: Method, uri: &str) -> RequestContext {
    RequestContext::new(request(method, uri))
}

/// An active, non-admin user.
#[must_use]
pub fn alice() -> SignedInUser {
    SignedInUser::new(1, "alice")
}

/// A site administrator.
#[must_use]
pub fn admin() -> SignedInUser {
    SignedInUser::new(2, "root").admin()
}

/// The repository `alice/proj` with the given per-unit permissions.
#[must_use]
pub fn repository(units: &[(UnitType, AccessMode)]) -> Repository {
    let permission = units
        .iter()
        .fold(Permission::new(AccessMode::None), |perm, &(unit, mode)| {
            perm.with_unit(unit, mode)
        });
    Repository::new("alice", "proj", permission)
}
