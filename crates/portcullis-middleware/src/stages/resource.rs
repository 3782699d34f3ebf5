//! Repository assignment.
//!
//! Routes under `/{username}/{reponame}` run [`AssignResource`] before any
//! repository gate. It looks the repository up together with the caller's
//! permission on it and attaches the result; an unknown repository ends
//! the request with 404.

use portcullis_core::{CallerIdentity, Handler, Outcome, RequestContext, Repository};

/// Looks up a repository and the caller's permission on it.
pub trait ResourceResolver: Send + Sync + 'static {
    /// Returns `None` when the repository does not exist or is invisible to the caller.
    fn resolve(&self, owner: &str, name: &str, caller: &CallerIdentity) -> Option<Repository>;
}

/// Stage attaching the repository named by the path.
#[derive(Debug, Clone)]
pub struct AssignResource<R> {
    resolver: R,
    owner_param: &'static str,
    name_param: &'static str,
}

impl<R: ResourceResolver> AssignResource<R> {
    /// Reads the `username` and `reponame` parameters.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            owner_param: "username",
            name_param: "reponame",
        }
    }

    /// Reads differently named parameters.
    #[must_use]
    pub fn with_params(mut self, owner_param: &'static str, name_param: &'static str) -> Self {
        self.owner_param = owner_param;
        self.name_param = name_param;
        self
    }
}

impl<R: ResourceResolver> Handler for AssignResource<R> {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        let (Some(owner), Some(name)) = (ctx.param(self.owner_param), ctx.param(self.name_param))
        else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                route = ctx.route().unwrap_or_default(),
                "resource stage on a route without owner/name parameters"
            );
            return ctx.not_found();
        };
        let name = name.strip_suffix(".git").unwrap_or(name);

        let Some(repository) = self.resolver.resolve(owner, name, ctx.identity()) else {
            tracing::debug!(request_id = %ctx.request_id(), owner, name, "repository not found");
            return ctx.not_found();
        };

        ctx.set_data("RepoName", repository.name.clone());
        ctx.set_data("Owner", repository.owner.clone());
        ctx.set_data("IsRepositoryAdmin", repository.permission.is_admin());
        ctx.set_repository(repository);
        Outcome::Continue
    }

    fn name(&self) -> &str {
        "assign_resource"
    }
}
