//! Stages that populate the context for the gates that follow.

mod identity;
mod request_id;
mod resource;

pub use identity::{IdentityResolver, ResolveIdentity};
pub use request_id::{RequestIdStage, REQUEST_ID_HEADER};
pub use resource::{AssignResource, ResourceResolver};
