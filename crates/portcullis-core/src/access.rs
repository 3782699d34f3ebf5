//! Repository permission model read by the unit gates.
//!
//! A repository is split into units (code, issues, pulls, ...) and a caller
//! holds an [`AccessMode`] per unit. Administrators and owners hold their mode
//! on every unit.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A permission unit of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Source browsing, releases downloads, clone
    Code,
    /// Issue tracker
    Issues,
    /// Pull requests
    PullRequests,
    /// Releases and tags
    Releases,
    /// Built-in wiki
    Wiki,
    /// Link to an external wiki
    ExternalWiki,
    /// Link to an external issue tracker
    ExternalTracker,
    /// Project boards
    Projects,
}

impl UnitType {
    /// Every unit, in display order.
    pub const ALL: [Self; 8] = [
        Self::Code,
        Self::Issues,
        Self::PullRequests,
        Self::Releases,
        Self::Wiki,
        Self::ExternalWiki,
        Self::ExternalTracker,
        Self::Projects,
    ];

    /// Returns the unit's configuration key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Issues => "issues",
            Self::PullRequests => "pull_requests",
            Self::Releases => "releases",
            Self::Wiki => "wiki",
            Self::ExternalWiki => "external_wiki",
            Self::ExternalTracker => "external_tracker",
            Self::Projects => "projects",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of access, ordered from none to owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// No access
    #[default]
    None,
    /// Read-only
    Read,
    /// Read and write
    Write,
    /// Repository administration
    Admin,
    /// Owner
    Owner,
}

/// A caller's permissions on one repository.
///
/// With no per-unit map the repository-wide mode applies to every unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    mode: AccessMode,
    units: Option<HashMap<UnitType, AccessMode>>,
}

impl Permission {
    /// Grants `mode` on every unit.
    #[must_use]
    pub fn new(mode: AccessMode) -> Self {
        Self { mode, units: None }
    }

    /// Grants `mode` on one unit, switching to per-unit permissions.
    #[must_use]
    pub fn with_unit(mut self, unit: UnitType, mode: AccessMode) -> Self {
        self.units.get_or_insert_with(HashMap::new).insert(unit, mode);
        self
    }

    /// Returns the repository-wide mode.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns the effective mode on `unit`.
    #[must_use]
    pub fn unit_mode(&self, unit: UnitType) -> AccessMode {
        if self.mode >= AccessMode::Admin {
            return self.mode;
        }
        match &self.units {
            None => self.mode,
            Some(units) => units.get(&unit).copied().unwrap_or_default(),
        }
    }

    /// Returns true if `unit` is readable.
    #[must_use]
    pub fn can_read(&self, unit: UnitType) -> bool {
        self.unit_mode(unit) >= AccessMode::Read
    }

    /// Returns true if `unit` is writable.
    #[must_use]
    pub fn can_write(&self, unit: UnitType) -> bool {
        self.unit_mode(unit) >= AccessMode::Write
    }

    /// Returns true if any of `units` is readable.
    #[must_use]
    pub fn can_read_any(&self, units: &[UnitType]) -> bool {
        units.iter().any(|&u| self.can_read(u))
    }

    /// Returns true if any of `units` is writable.
    #[must_use]
    pub fn can_write_any(&self, units: &[UnitType]) -> bool {
        units.iter().any(|&u| self.can_write(u))
    }

    /// Returns true for repository administrators and owners.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.mode >= AccessMode::Admin
    }
}

/// The repository a request is operating on, with the caller's permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Owner (user or organisation) name
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Archived repositories reject writes
    #[serde(default)]
    pub is_archived: bool,
    /// The caller's permission
    #[serde(default)]
    pub permission: Permission,
}

impl Repository {
    /// Creates an unarchived repository with the given permission.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, permission: Permission) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            is_archived: false,
            permission,
        }
    }

    /// Marks the repository archived.
    #[must_use]
    pub fn archived(mut self) -> Self {
        self.is_archived = true;
        self
    }

    /// Returns `owner/name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
