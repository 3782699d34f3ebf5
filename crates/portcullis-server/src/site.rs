//! The demo route table served by the `portcullis-server` binary.
//!
//! It wires the gates the way a code-hosting site does: public pages behind
//! the view toggle, account pages behind sign-in, repository pages behind
//! unit permissions. Sessions are out of scope, so every caller is
//! anonymous and the one repository, `demo/hello`, is public.

use std::sync::Arc;

use http::StatusCode;
use portcullis::prelude::*;
use portcullis::router::CompileError;
use portcullis_core::{Permission, Repository};

/// Resolves nobody: the demo has no session store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousOnly;

impl IdentityResolver for AnonymousOnly {
    fn identify(&self, _ctx: &RequestContext) -> CallerIdentity {
        CallerIdentity::Anonymous
    }

    /// Double-submit check: the `x-csrf-token` header must echo the `_csrf` cookie.
    fn verify_csrf(&self, ctx: &RequestContext) -> bool {
        match (ctx.header("x-csrf-token"), ctx.cookie("_csrf")) {
            (Some(header), Some(cookie)) => !header.is_empty() && header == cookie,
            _ => false,
        }
    }
}

/// A fixed catalogue of public repositories.
#[derive(Debug, Clone, Default)]
pub struct PublicCatalog {
    repositories: Vec<(String, String)>,
}

impl PublicCatalog {
    /// A catalogue holding `demo/hello`.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            repositories: vec![("demo".to_string(), "hello".to_string())],
        }
    }
}

impl ResourceResolver for PublicCatalog {
    fn resolve(&self, owner: &str, name: &str, _caller: &CallerIdentity) -> Option<Repository> {
        let (owner, name) = self
            .repositories
            .iter()
            .find(|(o, n)| o.eq_ignore_ascii_case(owner) && n.eq_ignore_ascii_case(name))?;

        let permission = [UnitType::Code, UnitType::Issues, UnitType::Releases, UnitType::Wiki]
            .into_iter()
            .fold(Permission::new(AccessMode::None), |perm, unit| {
                perm.with_unit(unit, AccessMode::Read)
            });
        Some(Repository::new(owner.clone(), name.clone(), permission))
    }
}

/// Builds the demo router.
///
/// # Errors
///
/// Fails only if a pattern below is malformed.
pub fn router(settings: Arc<Settings>) -> Result<Router, CompileError> {
    let gates = Gates::new(Arc::clone(&settings));
    let assign = BoxedHandler::new(AssignResource::new(PublicCatalog::demo()));

    let mut route = Route::new();
    route.use_middleware(RequestIdStage::trust_incoming());
    route.use_middleware(ResolveIdentity::new(AnonymousOnly));

    route.get("/", chain![gates.ign_sign_in(), home]);

    route.group("/explore", chain![gates.ign_explore_sign_in()], |r| {
        r.get("", chain![|ctx: &mut RequestContext| ctx.redirect_permanent("/explore/repos")]);
        r.get("/repos", chain![explore]);
    });

    route.group("/user", chain![], |r| {
        r.combo("/login")
            .get(chain![gates.req_sign_out(), login_form])
            .post(chain![gates.req_sign_out(), sign_in_unavailable]);
        r.get("/settings", chain![gates.req_sign_in(), page("settings")]);
        r.get("/settings/change_password", chain![gates.req_sign_in(), page("change password")]);
    });

    route.group("/admin", chain![gates.admin_req()], |r| {
        r.get("", chain![page("site administration")]);
    });

    route.get(
        "/milestones",
        chain![
            gates.req_sign_in(),
            gates.require_feature(Feature::MilestonesDashboard),
            page("milestones")
        ],
    );

    route.get("/{username}", chain![gates.ign_sign_in(), profile]);

    route.group("/{username}/{reponame}", chain![gates.ign_sign_in(), assign], |r| {
        r.get("", chain![RepoGate::reader(UnitType::Code), repo_home]);
        r.get("/commit/{sha:[a-f0-9]{7,40}}", chain![RepoGate::reader(UnitType::Code), commit]);
        r.get("/raw/*", chain![RepoGate::reader(UnitType::Code), raw]);
        r.get("/issues", chain![RepoGate::reader(UnitType::Issues), page("issues")]);
        r.post("/action/{action}", chain![gates.req_sign_in(), page("action")]);
        r.group("/settings", chain![gates.req_sign_in(), RepoGate::admin()], |r| {
            r.combo("")
                .get(chain![page("repository settings")])
                .post(chain![page("repository settings saved")]);
        });
    });

    route.not_found(chain![|ctx: &mut RequestContext| ctx.error(StatusCode::NOT_FOUND, "Page Not Found")]);

    route.build(settings)
}

fn page(title: &'static str) -> BoxedHandler {
    BoxedHandler::named(title, move |ctx: &mut RequestContext| ctx.text(StatusCode::OK, title))
}

fn home(ctx: &mut RequestContext) -> Outcome {
    ctx.text(StatusCode::OK, "portcullis demo")
}

fn explore(ctx: &mut RequestContext) -> Outcome {
    ctx.json(StatusCode::OK, &["demo/hello"])
}

fn login_form(ctx: &mut RequestContext) -> Outcome {
    ctx.text(StatusCode::OK, "sign in")
}

fn sign_in_unavailable(ctx: &mut RequestContext) -> Outcome {
    ctx.error(StatusCode::FORBIDDEN, "Sign-in is not available on this demo.")
}

fn profile(ctx: &mut RequestContext) -> Outcome {
    let name = ctx.param("username").unwrap_or_default().to_string();
    ctx.text(StatusCode::OK, &format!("profile of {name}"))
}

fn repo_home(ctx: &mut RequestContext) -> Outcome {
    let full_name = ctx
        .repository()
        .map(Repository::full_name)
        .unwrap_or_default();
    ctx.text(StatusCode::OK, &full_name)
}

fn commit(ctx: &mut RequestContext) -> Outcome {
    let sha = ctx.param("sha").unwrap_or_default().to_string();
    ctx.text(StatusCode::OK, &format!("commit {sha}"))
}

fn raw(ctx: &mut RequestContext) -> Outcome {
    let file = ctx.param("*").unwrap_or_default().to_string();
    ctx.text(StatusCode::OK, &format!("raw {file}"))
}
