//! Access gates: middleware built from declarative requirements.
//!
//! Each gate closes over an immutable settings snapshot taken when it is
//! built, inspects what earlier stages put on the context (identity, CSRF
//! validity, repository permission) and either lets the chain continue or
//! writes a 302, 400 or 403 and halts. Gates never touch context fields
//! they do not own.
//!
//! | Gate | Rejects with |
//! |------|--------------|
//! | [`Toggle`] sign-out required | 302 to home |
//! | [`Toggle`] CSRF | 400 |
//! | [`Toggle`] sign-in required | 302 to login, or 403 for inactive accounts |
//! | [`Toggle`] admin required | 403 |
//! | [`RepoGate`] | 403, also when no repository was resolved |
//! | [`FeatureGate`] | 403 |

mod feature;
mod repo;
mod toggle;

use std::sync::Arc;

use http::StatusCode;
use portcullis_config::Settings;
use portcullis_core::{Outcome, PortcullisError, RequestContext};

pub use feature::{Feature, FeatureGate};
pub use repo::{RepoGate, RepoRequirement};
pub use toggle::{Toggle, ToggleOptions};

/// Writes a denial, records it, and halts.
pub(crate) fn deny(
    ctx: &mut RequestContext,
    status: StatusCode,
    gate: &'static str,
    reason: &str,
) -> Outcome {
    tracing::info!(
        request_id = %ctx.request_id(),
        gate,
        caller = %ctx.identity().log_id(),
        http.path = ctx.path(),
        status = status.as_u16(),
        "access denied"
    );
    portcullis_telemetry::record_gate_denial(gate);
    ctx.fail(&PortcullisError::access_denied(status, gate, reason))
}

/// Gate factories bound to one settings snapshot.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use portcullis_config::Settings;
/// use portcullis_core::{fixtures, Handler};
/// use portcullis_middleware::Gates;
/// use http::{Method, StatusCode};
///
/// let gates = Gates::new(Arc::new(Settings::default()));
/// let mut ctx = fixtures::context(Method::GET, "/admin");
/// ctx.set_identity(fixtures::alice());
///
/// assert!(gates.admin_req().handle(&mut ctx).is_halt());
/// assert_eq!(ctx.response().status(), StatusCode::FORBIDDEN);
/// ```
#[derive(Debug, Clone)]
pub struct Gates {
    settings: Arc<Settings>,
}

impl Gates {
    /// Binds the factories to a snapshot.
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Returns the snapshot.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Builds a toggle from explicit options.
    pub fn toggle(&self, options: ToggleOptions) -> Toggle {
        Toggle::new(options, Arc::clone(&self.settings))
    }

    /// Requires a signed-in, active user.
    pub fn req_sign_in(&self) -> Toggle {
        self.toggle(ToggleOptions {
            sign_in_required: true,
            ..ToggleOptions::default()
        })
    }

    /// Requires sign-in only when the site requires it to view anything.
    pub fn ign_sign_in(&self) -> Toggle {
        self.toggle(ToggleOptions {
            sign_in_required: self.settings.service.require_sign_in_view,
            ..ToggleOptions::default()
        })
    }

    /// Like [`Gates::ign_sign_in`], also honouring the explore-only switch.
    pub fn ign_explore_sign_in(&self) -> Toggle {
        let service = &self.settings.service;
        self.toggle(ToggleOptions {
            sign_in_required: service.require_sign_in_view || service.explore_require_sign_in_view,
            ..ToggleOptions::default()
        })
    }

    /// Requires that nobody is signed in.
    pub fn req_sign_out(&self) -> Toggle {
        self.toggle(ToggleOptions {
            sign_out_required: true,
            ..ToggleOptions::default()
        })
    }

    /// Requires nothing and skips the CSRF check.
    pub fn ign_sign_in_and_csrf(&self) -> Toggle {
        self.toggle(ToggleOptions {
            disable_csrf: true,
            ..ToggleOptions::default()
        })
    }

    /// Requires a signed-in site administrator.
    pub fn admin_req(&self) -> Toggle {
        self.toggle(ToggleOptions {
            sign_in_required: true,
            admin_required: true,
            ..ToggleOptions::default()
        })
    }

    /// Rejects unless the feature is enabled in the snapshot.
    pub fn require_feature(&self, feature: Feature) -> FeatureGate {
        FeatureGate::new(feature, &self.settings.service)
    }
}
