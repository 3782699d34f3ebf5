//! The sign-in / sign-out / CSRF / admin toggle.

use std::sync::Arc;

use http::{Method, StatusCode};
use portcullis_config::Settings;
use portcullis_core::{Handler, Outcome, RequestContext};

use super::deny;

/// Which checks a [`Toggle`] performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleOptions {
    /// Reject anonymous callers.
    pub sign_in_required: bool,
    /// Send signed-in callers home.
    pub sign_out_required: bool,
    /// Reject non-administrators.
    pub admin_required: bool,
    /// Skip the CSRF check on `POST`.
    pub disable_csrf: bool,
}

/// Session gate evaluated in a fixed order: sign-out, CSRF, sign-in, admin.
#[derive(Debug, Clone)]
pub struct Toggle {
    options: ToggleOptions,
    settings: Arc<Settings>,
}

impl Toggle {
    /// Creates a toggle over a settings snapshot.
    pub fn new(options: ToggleOptions, settings: Arc<Settings>) -> Self {
        Self { options, settings }
    }

    /// Returns the configured checks.
    pub fn options(&self) -> ToggleOptions {
        self.options
    }

    fn require_sign_in(&self, ctx: &mut RequestContext) -> Outcome {
        let auth = &self.settings.auth;
        let Some(user) = ctx.signed_in_user() else {
            let back_to = format!("{}{}", auth.app_sub_url, ctx.request_uri());
            if let Err(err) = ctx.set_cookie(&auth.redirect_cookie, &back_to, &auth.home_url()) {
                tracing::warn!(error = %err, "redirect cookie not set");
            }
            portcullis_telemetry::record_gate_denial("sign_in");
            return ctx.redirect(&auth.login_url());
        };

        if !user.can_sign_in() {
            return deny(
                ctx,
                StatusCode::FORBIDDEN,
                "sign_in",
                "This account is not allowed to sign in.",
            );
        }

        if user.must_change_password && ctx.path() != auth.change_password_path {
            return ctx.redirect(&auth.change_password_url());
        }

        Outcome::Continue
    }
}

impl Handler for Toggle {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        if self.options.sign_out_required && ctx.is_signed_in() {
            return ctx.redirect(&self.settings.auth.home_url());
        }

        if !self.options.disable_csrf && ctx.method() == Method::POST && !ctx.csrf_valid() {
            return deny(ctx, StatusCode::BAD_REQUEST, "csrf", "Invalid CSRF token.");
        }

        if self.options.sign_in_required && self.require_sign_in(ctx).is_halt() {
            return Outcome::Halt;
        }

        if self.options.admin_required && !ctx.identity().is_admin() {
            return deny(
                ctx,
                StatusCode::FORBIDDEN,
                "admin",
                "Only site administrators may do this.",
            );
        }

        Outcome::Continue
    }

    fn name(&self) -> &str {
        "toggle"
    }
}
