//! Shared test helpers for `stellwerk-core` integration tests.
//!
//! These helpers provide reusable fixtures and in-memory port doubles so the
//! scenario tests can focus on reconciliation behaviour instead of wiring.

pub mod adapters;

use stellwerk_domain::{
    membership_key, BackoffKind, MembershipStatus, ReconcileSettings, RemoteMembership,
    RetrySettings, RoleAssignment, RoleKind,
};

/// Retry settings with a delay short enough for tests.
pub fn fast_retry() -> RetrySettings {
    RetrySettings { max_attempts: 3, delay_ms: 1, backoff: BackoffKind::Fixed }
}

/// Root groups and ceiling used across the scenario tests.
pub fn reconcile_settings() -> ReconcileSettings {
    ReconcileSettings {
        root_groups: vec!["root-oeffentlich".into(), "root-ersatz".into()],
        aggregation_ceiling: RoleKind::Lehr,
    }
}

/// An active remote membership under the deterministic composite key.
pub fn remote_membership(person_id: &str, group_id: &str, role: RoleKind) -> RemoteMembership {
    RemoteMembership {
        membership_id: membership_key(person_id, group_id),
        group_id: group_id.to_owned(),
        person_id: person_id.to_owned(),
        role,
        status: MembershipStatus::Active,
    }
}

/// A Personenkontext snapshot entry.
pub fn assignment(person_id: &str, org: &str, role_id: &str, role: RoleKind) -> RoleAssignment {
    RoleAssignment::new(person_id, org, role_id, role)
}
