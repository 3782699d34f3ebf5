//! # Portcullis
//!
//! A hierarchical HTTP router that guards every route with an ordered chain
//! of middleware and access gates.
//!
//! Routes are registered once at startup through [`Route`]: nested groups
//! stack URL prefixes and middleware, [`Route::combo`] attaches several
//! methods to one pattern and [`Route::mount`] grafts a sub-router. The
//! registry is then frozen into a [`Router`], which hosts share across
//! workers and drive through [`Router::serve`].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use portcullis::prelude::*;
//! use portcullis_core::fixtures;
//! use http::{Method, StatusCode};
//!
//! fn home(ctx: &mut RequestContext) -> Outcome {
//!     ctx.text(StatusCode::OK, "home")
//! }
//! fn star(ctx: &mut RequestContext) -> Outcome {
//!     ctx.redirect("/alice/proj")
//! }
//!
//! let settings = Arc::new(Settings::default());
//! let gates = Gates::new(Arc::clone(&settings));
//!
//! let mut route = Route::new();
//! route.use_middleware(RequestIdStage::new());
//! route.get("/", chain![home]);
//! let signed_in = gates.toggle(ToggleOptions {
//!     sign_in_required: true,
//!     disable_csrf: true,
//!     ..ToggleOptions::default()
//! });
//! route.group("/{username}/{reponame}", chain![], |r| {
//!     r.post("/action/{action}", chain![signed_in, star]);
//! });
//! let router = route.build(settings).unwrap();
//!
//! let response = router.handle(fixtures::request(Method::POST, "/alice/proj/action/star"));
//! assert_eq!(response.status(), StatusCode::FOUND);
//! assert_eq!(response.headers()["location"], "/user/login");
//! ```
//!
//! ## Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | [`router`] | Pattern compiler and route tree |
//! | [`core`] | Request context, handler contract, access model |
//! | [`middleware`] | Pipeline, fault recovery, gates, resolution stages |
//! | [`config`] | Settings snapshot and loader |
//! | [`telemetry`] | Logging and metrics |

#![doc(html_root_url = "https://docs.rs/portcullis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod dispatch;
mod route;

pub use dispatch::Router;
pub use route::{Combo, Route};

/// Re-export of portcullis-config.
pub use portcullis_config as config;

/// Re-export of portcullis-core.
pub use portcullis_core as core;

/// Re-export of portcullis-middleware.
pub use portcullis_middleware as middleware;

/// Re-export of portcullis-router.
pub use portcullis_router as router;

/// Re-export of portcullis-telemetry.
pub use portcullis_telemetry as telemetry;

pub use portcullis_core::chain;

/// Everything needed to register routes and write handlers.
pub mod prelude {
    pub use crate::{Combo, Route, Router};
    pub use portcullis_config::{RunMode, Settings};
    pub use portcullis_core::{
        chain, AccessMode, BoxedHandler, CallerIdentity, Handler, Outcome, RequestContext,
        SignedInUser, UnitType,
    };
    pub use portcullis_middleware::{
        AssignResource, Feature, Gates, IdentityResolver, RepoGate, RequestIdStage,
        ResolveIdentity, ResourceResolver, ToggleOptions,
    };
}
