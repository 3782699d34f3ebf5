//! # Portcullis Middleware
//!
//! Runs a resolved handler chain and guards it.
//!
//! ```text
//! request ─► Recovery ─► Pipeline ─► [global] ─► [group…] ─► [route-local] ─► handler
//!               │                      │  any step may Halt: the rest is skipped
//!               └── a panic anywhere becomes exactly one 500
//! ```
//!
//! - [`Pipeline`] executes steps in order and reports a [`RequestState`]
//! - [`Recovery`] is the two-layer fault boundary
//! - [`gates`] builds access gates from declarative requirements
//! - [`stages`] populates identity, repository and request id for the gates

#![doc(html_root_url = "https://docs.rs/portcullis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod gates;
pub mod pipeline;
pub mod recovery;
pub mod stages;

pub use gates::{Feature, FeatureGate, Gates, RepoGate, RepoRequirement, Toggle, ToggleOptions};
pub use pipeline::{HandlerEntry, Pipeline, RequestState};
pub use recovery::Recovery;
pub use stages::{
    AssignResource, IdentityResolver, RequestIdStage, ResolveIdentity, ResourceResolver,
};
