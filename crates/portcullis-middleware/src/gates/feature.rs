//! Site feature switches as gates.

use http::StatusCode;
use portcullis_config::ServiceSection;
use portcullis_core::{Handler, Outcome, RequestContext};

use super::deny;

/// A feature that can be switched off site-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Signing in with OpenID.
    OpenIdSignIn,
    /// Signing up with OpenID.
    OpenIdSignUp,
    /// The milestones dashboard page.
    MilestonesDashboard,
    /// Webhook settings pages.
    Webhooks,
    /// Captcha images.
    Captcha,
}

impl Feature {
    /// Returns true if `service` enables this feature.
    pub fn enabled_in(self, service: &ServiceSection) -> bool {
        match self {
            Self::OpenIdSignIn => service.enable_openid_sign_in,
            Self::OpenIdSignUp => service.enable_openid_sign_up,
            Self::MilestonesDashboard => service.show_milestones_dashboard_page,
            Self::Webhooks => !service.disable_webhooks,
            Self::Captcha => service.enable_captcha,
        }
    }
}

/// Rejects with 403 when its feature was off in the snapshot it was built from.
#[derive(Debug, Clone, Copy)]
pub struct FeatureGate {
    feature: Feature,
    enabled: bool,
}

impl FeatureGate {
    /// Evaluates `feature` against the snapshot once.
    pub fn new(feature: Feature, service: &ServiceSection) -> Self {
        Self {
            feature,
            enabled: feature.enabled_in(service),
        }
    }

    /// Returns the gated feature.
    pub fn feature(&self) -> Feature {
        self.feature
    }
}

impl Handler for FeatureGate {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        if self.enabled {
            Outcome::Continue
        } else {
            tracing::debug!(feature = ?self.feature, "feature disabled");
            deny(ctx, StatusCode::FORBIDDEN, "feature", "Forbidden")
        }
    }

    fn name(&self) -> &str {
        "feature"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use portcullis_core::fixtures;

    #[test]
    fn test_defaults() {
        let service = ServiceSection::default();
        assert!(!Feature::OpenIdSignIn.enabled_in(&service));
        assert!(Feature::MilestonesDashboard.enabled_in(&service));
        assert!(Feature::Webhooks.enabled_in(&service));
    }

    #[test]
    fn test_disabled_feature_forbidden() {
        let service = ServiceSection {
            disable_webhooks: true,
            ..ServiceSection::default()
        };
        let gate = FeatureGate::new(Feature::Webhooks, &service);
        let mut ctx = fixtures::context(Method::GET, "/alice/proj/settings/hooks");
        assert!(gate.handle(&mut ctx).is_halt());
        assert_eq!(ctx.response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_enabled_feature_continues() {
        let service = ServiceSection {
            enable_openid_sign_in: true,
            ..ServiceSection::default()
        };
        let gate = FeatureGate::new(Feature::OpenIdSignIn, &service);
        let mut ctx = fixtures::context(Method::GET, "/user/login/openid");
        assert!(gate.handle(&mut ctx).is_continue());
        assert_eq!(gate.feature(), Feature::OpenIdSignIn);
    }
}
