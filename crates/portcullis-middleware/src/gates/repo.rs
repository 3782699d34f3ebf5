//! Repository permission gates.
//!
//! These read the [`Repository`](portcullis_core::Repository) attached by
//! the resource stage. Without one they reject: a gate that cannot see a
//! permission never grants it.

use http::StatusCode;
use portcullis_core::{Handler, Outcome, RequestContext, UnitType};

use super::deny;

/// What a [`RepoGate`] demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRequirement {
    /// Read access to at least one of the units.
    Reader(Vec<UnitType>),
    /// Write access to at least one of the units.
    Writer(Vec<UnitType>),
    /// Repository administration.
    Admin,
    /// The repository accepts changes.
    NotArchived,
}

/// A gate over the caller's permission on the current repository.
#[derive(Debug, Clone)]
pub struct RepoGate {
    requirement: RepoRequirement,
}

impl RepoGate {
    /// Requires read access to `unit`.
    pub fn reader(unit: UnitType) -> Self {
        Self::reader_or(&[unit])
    }

    /// Requires write access to `unit`.
    pub fn writer(unit: UnitType) -> Self {
        Self::writer_or(&[unit])
    }

    /// Requires read access to any of `units`.
    pub fn reader_or(units: &[UnitType]) -> Self {
        Self {
            requirement: RepoRequirement::Reader(units.to_vec()),
        }
    }

    /// Requires write access to any of `units`.
    pub fn writer_or(units: &[UnitType]) -> Self {
        Self {
            requirement: RepoRequirement::Writer(units.to_vec()),
        }
    }

    /// Requires repository administration.
    pub fn admin() -> Self {
        Self {
            requirement: RepoRequirement::Admin,
        }
    }

    /// Rejects archived repositories.
    pub fn not_archived() -> Self {
        Self {
            requirement: RepoRequirement::NotArchived,
        }
    }

    /// Returns the requirement.
    pub fn requirement(&self) -> &RepoRequirement {
        &self.requirement
    }

    fn gate_name(&self) -> &'static str {
        match self.requirement {
            RepoRequirement::Reader(_) => "repo_reader",
            RepoRequirement::Writer(_) => "repo_writer",
            RepoRequirement::Admin => "repo_admin",
            RepoRequirement::NotArchived => "repo_not_archived",
        }
    }
}

impl Handler for RepoGate {
    fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        let allowed = ctx.repository().is_some_and(|repo| match &self.requirement {
            RepoRequirement::Reader(units) => repo.permission.can_read_any(units),
            RepoRequirement::Writer(units) => repo.permission.can_write_any(units),
            RepoRequirement::Admin => repo.permission.is_admin(),
            RepoRequirement::NotArchived => !repo.is_archived,
        });
        if allowed {
            return Outcome::Continue;
        }

        if ctx.repository().is_none() {
            tracing::warn!(
                request_id = %ctx.request_id(),
                gate = self.gate_name(),
                "repository gate ran before a repository was assigned"
            );
        }
        let reason = match self.requirement {
            RepoRequirement::NotArchived => "This repository is archived.",
            _ => "You do not have permission to access this repository.",
        };
        deny(ctx, StatusCode::FORBIDDEN, self.gate_name(), reason)
    }

    fn name(&self) -> &str {
        self.gate_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use portcullis_core::{fixtures, AccessMode, Permission, Repository};

    fn run(gate: &RepoGate, repo: Option<Repository>) -> (Outcome, StatusCode) {
        let mut ctx = fixtures::context(Method::GET, "/alice/proj/issues");
        if let Some(repo) = repo {
            ctx.set_repository(repo);
        }
        let outcome = gate.handle(&mut ctx);
        (outcome, ctx.response().status())
    }

    #[test]
    fn test_missing_repository_fails_closed() {
        for gate in [
            RepoGate::reader(UnitType::Code),
            RepoGate::writer(UnitType::Code),
            RepoGate::admin(),
            RepoGate::not_archived(),
        ] {
            let (outcome, status) = run(&gate, None);
            assert!(outcome.is_halt(), "{gate:?}");
            assert_eq!(status, StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_unit_reader() {
        let repo = fixtures::repository(&[(UnitType::Issues, AccessMode::Read)]);
        assert!(run(&RepoGate::reader(UnitType::Issues), Some(repo.clone())).0.is_continue());
        assert!(run(&RepoGate::reader(UnitType::Code), Some(repo.clone())).0.is_halt());
        assert!(run(&RepoGate::writer(UnitType::Issues), Some(repo)).0.is_halt());
    }

    #[test]
    fn test_reader_or_any_unit() {
        let repo = fixtures::repository(&[(UnitType::Releases, AccessMode::Read)]);
        let gate = RepoGate::reader_or(&[UnitType::PullRequests, UnitType::Issues, UnitType::Releases]);
        assert!(run(&gate, Some(repo.clone())).0.is_continue());
        assert!(run(&RepoGate::reader_or(&[]), Some(repo)).0.is_halt());
    }

    #[test]
    fn test_writer_or() {
        let repo = fixtures::repository(&[
            (UnitType::Code, AccessMode::Read),
            (UnitType::Wiki, AccessMode::Write),
        ]);
        let gate = RepoGate::writer_or(&[UnitType::Code, UnitType::Wiki]);
        assert!(run(&gate, Some(repo)).0.is_continue());
    }

    #[test]
    fn test_repo_admin_implies_units() {
        let repo = Repository::new("alice", "proj", Permission::new(AccessMode::Admin));
        assert!(run(&RepoGate::admin(), Some(repo.clone())).0.is_continue());
        assert!(run(&RepoGate::writer(UnitType::Projects), Some(repo)).0.is_continue());

        let writer = Repository::new("alice", "proj", Permission::new(AccessMode::Write));
        assert!(run(&RepoGate::admin(), Some(writer)).0.is_halt());
    }

    #[test]
    fn test_archived() {
        let repo = Repository::new("alice", "proj", Permission::new(AccessMode::Owner));
        assert!(run(&RepoGate::not_archived(), Some(repo.clone())).0.is_continue());

        let mut ctx = fixtures::context(Method::POST, "/alice/proj/settings");
        ctx.set_repository(repo.archived());
        assert!(RepoGate::not_archived().handle(&mut ctx).is_halt());
        assert_eq!(ctx.response().body(), b"This repository is archived.");
    }
}
