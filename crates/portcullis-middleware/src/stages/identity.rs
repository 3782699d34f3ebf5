//! Caller identity resolution.
//!
//! Sessions and tokens live outside the router. An [`IdentityResolver`]
//! turns whatever the request carries into a [`CallerIdentity`] and a CSRF
//! verdict; [`ResolveIdentity`] stores both on the context for the gates.

use portcullis_core::{CallerIdentity, Handler, Outcome, RequestContext};

/// Looks up who is calling.
///
/// Implementations may block (e.g. on a session store); they run on the
/// request's own worker.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Returns the caller, or [`CallerIdentity::Anonymous`].
    fn identify(&self, ctx: &RequestContext) -> CallerIdentity;

    /// Returns true if the request carries a valid CSRF token.
    fn verify_csrf(&self, ctx: &RequestContext) -> bool;
}

/// Stage storing the resolved identity and CSRF verdict.
#[derive(Debug, Clone)]
pub struct ResolveIdentity<R> {
    resolver: R,
}

impl<R: IdentityResolver> ResolveIdentity<R> {
    /// Wraps a resolver.
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

impl<R: IdentityResolver> Handler for ResolveIdentity<R> {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        let identity = self.resolver.identify(ctx);
        let csrf_valid = self.resolver.verify_csrf(ctx);

        ctx.set_data("IsSigned", identity.is_signed_in());
        ctx.set_data("IsAdmin", identity.is_admin());
        if let Some(user) = identity.signed_in_user() {
            ctx.set_data("SignedUserName", user.name.clone());
        }
        tracing::trace!(request_id = %ctx.request_id(), caller = %identity.log_id(), "identity resolved");

        ctx.set_identity(identity);
        ctx.set_csrf_valid(csrf_valid);
        Outcome::Continue
    }

    fn name(&self) -> &str {
        "resolve_identity"
    }
}
