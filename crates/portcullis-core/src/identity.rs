//! Caller identity.
//!
//! Identity is resolved by middleware early in the chain and read by the
//! access gates that follow it.

use serde::{Deserialize, Serialize};

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInUser {
    /// Account id
    pub id: i64,
    /// Login name
    pub name: String,
    /// Site administrator
    #[serde(default)]
    pub is_admin: bool,
    /// Account activated (e.g. email confirmed)
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Login disabled by an administrator
    #[serde(default)]
    pub prohibit_login: bool,
    /// Must pick a new password before doing anything else
    #[serde(default)]
    pub must_change_password: bool,
}

fn default_true() -> bool {
    true
}

impl SignedInUser {
    /// Creates an active, non-admin user.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_admin: false,
            is_active: true,
            prohibit_login: false,
            must_change_password: false,
        }
    }

    /// Grants site administration.
    #[must_use]
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Marks the account as not yet activated.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Marks the account as barred from signing in.
    #[must_use]
    pub fn prohibited(mut self) -> Self {
        self.prohibit_login = true;
        self
    }

    /// Requires a password change before further use.
    #[must_use]
    pub fn must_change_password(mut self) -> Self {
        self.must_change_password = true;
        self
    }

    /// Returns true if the account may use the site.
    #[must_use]
    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.prohibit_login
    }
}

/// Who is making the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// No session.
    #[default]
    Anonymous,
    /// A signed-in account.
    User(SignedInUser),
}

impl CallerIdentity {
    /// Shorthand for a signed-in, active, non-admin user.
    #[must_use]
    pub fn user(id: i64, name: impl Into<String>) -> Self {
        Self::User(SignedInUser::new(id, name))
    }

    /// Returns true if a user is signed in.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn signed_in_user(&self) -> Option<&SignedInUser> {
        match self {
            Self::User(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    /// Returns true for a signed-in site administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.signed_in_user().is_some_and(|u| u.is_admin)
    }

    /// Returns an identifier suitable for logging. Never contains secrets.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::User(user) => format!("user:{}", user.id),
            Self::Anonymous => "anonymous".to_string(),
        }
    }
}

impl From<SignedInUser> for CallerIdentity {
    fn from(user: SignedInUser) -> Self {
        Self::User(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_default() {
        let identity = CallerIdentity::default();
        assert!(!identity.is_signed_in());
        assert!(!identity.is_admin());
        assert_eq!(identity.log_id(), "anonymous");
    }

    #[test]
    fn test_user_flags() {
        let identity: CallerIdentity = SignedInUser::new(7, "alice").admin().into();
        assert!(identity.is_signed_in());
        assert!(identity.is_admin());
        assert_eq!(identity.log_id(), "user:7");

        assert!(!SignedInUser::new(1, "bob").inactive().can_sign_in());
        assert!(!SignedInUser::new(1, "bob").prohibited().can_sign_in());
    }

    #[test]
    fn test_deserialize_defaults() {
        let identity: CallerIdentity =
            serde_json::from_str(r#"{"kind":"user","id":3,"name":"carol"}"#).unwrap();
        let user = identity.signed_in_user().unwrap();
        assert!(user.is_active);
        assert!(!user.is_admin);
    }
}
