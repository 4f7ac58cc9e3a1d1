//! Membership reconciliation against one external system
//!
//! The reconciler reads the memberships a remote system currently holds for a
//! person, diffs them against the locally-authoritative assignment snapshot,
//! and applies the result as one batched delete and one batched upsert. The
//! two halves are independent: a failure in one never blocks or rolls back
//! the other.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use stellwerk_domain::errors::{AdapterError, DomainError};
use stellwerk_domain::{
    MassResult, MembershipParams, MembershipStatus, ReconcileSettings, RemoteMembership,
    RetrySettings, RoleAssignment, RoleKind,
};
use tracing::{debug, error, instrument, warn};

use super::ports::DirectoryAdapter;
use super::retry::adapter_executor;

/// Which half of a reconciliation run a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Upsert,
    Delete,
}

impl BatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// One failed half of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub kind: BatchKind,
    pub error: AdapterError,
}

/// Counts and failures of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileSummary {
    /// Memberships created or refreshed.
    pub updated: u32,
    /// Memberships removed.
    pub deleted: u32,
    /// Failed halves; empty when the run fully converged.
    pub failures: Vec<BatchFailure>,
}

impl ReconcileSummary {
    pub fn is_converged(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The remote changes one reconciliation run will apply.
///
/// Building a plan is pure. A plan whose target state already matches the
/// remote state is empty; applying it issues no remote call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_upsert: Vec<MembershipParams>,
    pub to_delete: Vec<String>,
}

impl ReconcilePlan {
    /// Diffs the desired assignments against the current remote memberships.
    ///
    /// Duplicate organisation entries merge to the higher role. Root groups
    /// present remotely are overwritten with the person's aggregate role
    /// (highest assigned kind, capped at the configured ceiling) and never
    /// enter the delete set. When anything differs, every target entry is
    /// refreshed under its deterministic composite key; the remote treats
    /// those as upserts, so re-sending an unchanged entry is safe.
    pub fn build(
        person_id: &str,
        desired: &[RoleAssignment],
        current: &[RemoteMembership],
        settings: &ReconcileSettings,
    ) -> Self {
        let mut target: BTreeMap<String, RoleKind> = BTreeMap::new();
        for assignment in desired {
            target
                .entry(assignment.organisation_id.clone())
                .and_modify(|role| *role = role.higher(assignment.role))
                .or_insert(assignment.role);
        }

        let aggregate =
            RoleKind::highest_under(target.values().copied(), settings.aggregation_ceiling);
        for membership in current {
            if settings.is_root_group(&membership.group_id) {
                target.insert(membership.group_id.clone(), aggregate);
            }
        }

        let to_delete: Vec<String> = current
            .iter()
            .filter(|membership| !target.contains_key(&membership.group_id))
            .map(|membership| membership.membership_id.clone())
            .collect();

        let active: BTreeMap<&str, RoleKind> = current
            .iter()
            .filter(|membership| membership.status == MembershipStatus::Active)
            .map(|membership| (membership.group_id.as_str(), membership.role))
            .collect();
        let in_sync = to_delete.is_empty()
            && target.len() == active.len()
            && target.iter().all(|(group, role)| active.get(group.as_str()) == Some(role));
        if in_sync {
            return Self::default();
        }

        let to_upsert = target
            .into_iter()
            .map(|(group_id, role)| MembershipParams::keyed(person_id, &group_id, role))
            .collect();

        Self { to_upsert, to_delete }
    }

    pub fn is_empty(&self) -> bool {
        self.to_upsert.is_empty() && self.to_delete.is_empty()
    }
}

/// Drives reconciliation plans against one [`DirectoryAdapter`].
pub struct MembershipReconciler {
    adapter: Arc<dyn DirectoryAdapter>,
    settings: ReconcileSettings,
    retry: RetrySettings,
}

impl MembershipReconciler {
    pub fn new(
        adapter: Arc<dyn DirectoryAdapter>,
        settings: ReconcileSettings,
        retry: RetrySettings,
    ) -> Self {
        Self { adapter, settings, retry }
    }

    /// Converge the remote memberships for a person onto the desired
    /// assignment snapshot.
    ///
    /// A failed read aborts the run; without the current state no diff can be
    /// computed. Apply failures do not abort: both halves are attempted and
    /// reported in the summary.
    #[instrument(skip(self, desired), fields(desired = desired.len()))]
    pub async fn reconcile(
        &self,
        person_id: &str,
        desired: &[RoleAssignment],
    ) -> Result<ReconcileSummary, DomainError> {
        let current = self.read_current(person_id).await?;
        let plan = ReconcilePlan::build(person_id, desired, &current, &self.settings);
        Ok(self.apply(person_id, plan).await)
    }

    /// Remove every membership the remote system holds for the person, root
    /// groups included. Reserved for the person-deletion path; `reconcile`
    /// itself never deletes root memberships.
    #[instrument(skip(self))]
    pub async fn remove_all(&self, person_id: &str) -> Result<ReconcileSummary, DomainError> {
        let current = self.read_current(person_id).await?;
        let plan = ReconcilePlan {
            to_upsert: Vec::new(),
            to_delete: current.into_iter().map(|membership| membership.membership_id).collect(),
        };
        Ok(self.apply(person_id, plan).await)
    }

    async fn read_current(&self, person_id: &str) -> Result<Vec<RemoteMembership>, DomainError> {
        let executor = adapter_executor(&self.retry);
        executor.execute(|| self.adapter.read_memberships(person_id)).await.map_err(|err| {
            error!(person_id, error = %err, "reading current memberships failed, aborting run");
            DomainError::from(err)
        })
    }

    async fn apply(&self, person_id: &str, plan: ReconcilePlan) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        if plan.is_empty() {
            debug!(person_id, "memberships already in sync");
            return summary;
        }

        if !plan.to_delete.is_empty() {
            let executor = adapter_executor(&self.retry);
            let ids = &plan.to_delete;
            match executor.execute(|| self.adapter.delete_memberships(ids.clone())).await {
                Ok(result) => {
                    summary.deleted = (result.len() - result.failed_count()) as u32;
                    note_partial(person_id, BatchKind::Delete, &result, &mut summary);
                }
                Err(err) => {
                    error!(person_id, error = %err, "membership delete batch failed");
                    summary.failures.push(BatchFailure { kind: BatchKind::Delete, error: err });
                }
            }
        }

        if !plan.to_upsert.is_empty() {
            let executor = adapter_executor(&self.retry);
            let params = &plan.to_upsert;
            match executor.execute(|| self.adapter.upsert_memberships(params.clone())).await {
                Ok(result) => {
                    summary.updated = (result.len() - result.failed_count()) as u32;
                    note_partial(person_id, BatchKind::Upsert, &result, &mut summary);
                }
                Err(err) => {
                    error!(person_id, error = %err, "membership upsert batch failed");
                    summary.failures.push(BatchFailure { kind: BatchKind::Upsert, error: err });
                }
            }
        }

        debug!(
            person_id,
            updated = summary.updated,
            deleted = summary.deleted,
            failures = summary.failures.len(),
            "reconciliation applied"
        );
        summary
    }
}

fn note_partial(
    person_id: &str,
    kind: BatchKind,
    result: &MassResult,
    summary: &mut ReconcileSummary,
) {
    if result.is_complete() {
        return;
    }
    for item in result.failed_items() {
        warn!(person_id, batch = kind.as_str(), item = %item.item_id, "batch item failed");
    }
    summary.failures.push(BatchFailure {
        kind,
        error: AdapterError::PartialBatch { failed: result.failed_count(), total: result.len() },
    });
}
