//! Grant/revoke diffs for auth-provider roles
//!
//! When a person's role set changes, only the delta of externally-derived
//! permission names is applied: a name already implied by another role the
//! person concurrently holds is neither granted again nor revoked.

use std::collections::BTreeSet;
use std::sync::Arc;

use stellwerk_domain::errors::AdapterError;
use stellwerk_domain::RoleAssignment;
use tracing::warn;

use super::ports::RoleCatalog;

/// Names to grant and revoke at the auth provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantDiff {
    pub grant: BTreeSet<String>,
    pub revoke: BTreeSet<String>,
}

impl GrantDiff {
    pub fn is_noop(&self) -> bool {
        self.grant.is_empty() && self.revoke.is_empty()
    }
}

/// Computes grant/revoke deltas from role-id changes.
pub struct RoleGrantDiffer {
    catalog: Arc<dyn RoleCatalog>,
}

impl RoleGrantDiffer {
    pub fn new(catalog: Arc<dyn RoleCatalog>) -> Self {
        Self { catalog }
    }

    /// Delta for a role replaced by another. `current` is the post-change
    /// snapshot.
    ///
    /// A snapshot referencing the same role id twice yields the no-op diff:
    /// diffing an ambiguous snapshot would oscillate between grant and revoke
    /// on consecutive events.
    pub async fn diff_updated(
        &self,
        current: &[RoleAssignment],
        old_role_id: &str,
        new_role_id: &str,
    ) -> Result<GrantDiff, AdapterError> {
        if has_duplicate_role_ids(current) {
            warn!(old_role_id, new_role_id, "duplicate role ids in snapshot, skipping grant diff");
            return Ok(GrantDiff::default());
        }
        let old_names = self.names_for(old_role_id).await?;
        let new_names = self.names_for(new_role_id).await?;
        let held = self.names_excluding(current, &[old_role_id, new_role_id]).await?;

        let grant = new_names
            .difference(&old_names)
            .filter(|name| !held.contains(*name))
            .cloned()
            .collect();
        let revoke = old_names
            .difference(&new_names)
            .filter(|name| !held.contains(*name))
            .cloned()
            .collect();
        Ok(GrantDiff { grant, revoke })
    }

    /// Delta for a newly added role: grants only.
    pub async fn diff_added(
        &self,
        current: &[RoleAssignment],
        added_role_id: &str,
    ) -> Result<GrantDiff, AdapterError> {
        if has_duplicate_role_ids(current) {
            warn!(added_role_id, "duplicate role ids in snapshot, skipping grant diff");
            return Ok(GrantDiff::default());
        }
        let new_names = self.names_for(added_role_id).await?;
        let held = self.names_excluding(current, &[added_role_id]).await?;

        let grant = new_names.into_iter().filter(|name| !held.contains(name)).collect();
        Ok(GrantDiff { grant, revoke: BTreeSet::new() })
    }

    /// Delta for a removed role: revokes only names no remaining role implies.
    pub async fn diff_removed(
        &self,
        remaining: &[RoleAssignment],
        removed_role_id: &str,
    ) -> Result<GrantDiff, AdapterError> {
        if has_duplicate_role_ids(remaining) {
            warn!(removed_role_id, "duplicate role ids in snapshot, skipping grant diff");
            return Ok(GrantDiff::default());
        }
        let old_names = self.names_for(removed_role_id).await?;
        let held = self.names_excluding(remaining, &[removed_role_id]).await?;

        let revoke = old_names.into_iter().filter(|name| !held.contains(name)).collect();
        Ok(GrantDiff { grant: BTreeSet::new(), revoke })
    }

    /// Union of names implied by the initial role set of a fresh person.
    pub async fn initial_grants(
        &self,
        assignments: &[RoleAssignment],
    ) -> Result<BTreeSet<String>, AdapterError> {
        let mut names = BTreeSet::new();
        let mut seen = BTreeSet::new();
        for assignment in assignments {
            if seen.insert(assignment.role_id.as_str()) {
                names.extend(self.names_for(&assignment.role_id).await?);
            }
        }
        Ok(names)
    }

    async fn names_for(&self, role_id: &str) -> Result<BTreeSet<String>, AdapterError> {
        Ok(self.catalog.permission_names(role_id).await?.into_iter().collect())
    }

    /// Union of names implied by every role except the excluded ids
    /// (allExcludingTarget).
    async fn names_excluding(
        &self,
        assignments: &[RoleAssignment],
        excluded: &[&str],
    ) -> Result<BTreeSet<String>, AdapterError> {
        let mut names = BTreeSet::new();
        let mut seen = BTreeSet::new();
        for assignment in assignments {
            let role_id = assignment.role_id.as_str();
            if excluded.contains(&role_id) || !seen.insert(role_id) {
                continue;
            }
            names.extend(self.catalog.permission_names(role_id).await?);
        }
        Ok(names)
    }
}

fn has_duplicate_role_ids(assignments: &[RoleAssignment]) -> bool {
    let mut seen = BTreeSet::new();
    assignments.iter().any(|assignment| !seen.insert(assignment.role_id.as_str()))
}
