//! Event-driven provisioning service - core business logic

use std::collections::BTreeSet;
use std::sync::Arc;

use stellwerk_domain::errors::AdapterError;
use stellwerk_domain::{IdentityParams, PersonEvent, RetrySettings, RoleAssignment};
use tracing::{debug, info, instrument, warn};

use super::grants::{GrantDiff, RoleGrantDiffer};
use super::ports::{DirectoryAdapter, IdentityRegistry, RoleGrantPort};
use super::reconciler::MembershipReconciler;
use super::report::SyncReport;
use super::retry::adapter_executor;

struct IdentitySystem {
    adapter: Arc<dyn DirectoryAdapter>,
    retry: RetrySettings,
}

/// Drives the reconciliation engine from domain events.
///
/// The service owns all ports. It never returns an error to the event
/// dispatcher: every failure is recorded in the [`SyncReport`] and logged,
/// and the local change that triggered the event stands regardless.
pub struct ProvisioningService {
    reconciler: MembershipReconciler,
    differ: RoleGrantDiffer,
    grants: Arc<dyn RoleGrantPort>,
    registry: Arc<dyn IdentityRegistry>,
    identity_systems: Vec<IdentitySystem>,
    grant_retry: RetrySettings,
}

impl ProvisioningService {
    pub fn new(
        reconciler: MembershipReconciler,
        differ: RoleGrantDiffer,
        grants: Arc<dyn RoleGrantPort>,
        registry: Arc<dyn IdentityRegistry>,
        grant_retry: RetrySettings,
    ) -> Self {
        Self { reconciler, differ, grants, registry, identity_systems: Vec::new(), grant_retry }
    }

    /// Register an identity-bearing system. Identities are created there on
    /// person creation and deleted again on person deletion.
    pub fn with_identity_system(
        mut self,
        adapter: Arc<dyn DirectoryAdapter>,
        retry: RetrySettings,
    ) -> Self {
        self.identity_systems.push(IdentitySystem { adapter, retry });
        self
    }

    /// Handle one domain event end to end.
    #[instrument(skip(self, event), fields(person_id = %event.person_id(), kind = event.kind()))]
    pub async fn handle_event(&self, event: &PersonEvent) -> SyncReport {
        let mut report = SyncReport::new(event.person_id(), event.kind());
        match event {
            PersonEvent::PersonCreated { person, assignments } => {
                self.on_person_created(person, assignments, &mut report).await;
            }
            PersonEvent::ContextAdded { person_id, added, current } => {
                self.run_reconcile(person_id, current, &mut report).await;
                let executor = adapter_executor(&self.grant_retry);
                match executor.execute(|| self.differ.diff_added(current, &added.role_id)).await {
                    Ok(diff) => self.apply_grant_diff(person_id, diff, &mut report).await,
                    Err(err) => report.record_error("compute grant diff", &err),
                }
            }
            PersonEvent::ContextUpdated { person_id, old_role_id, new_role_id, current } => {
                self.run_reconcile(person_id, current, &mut report).await;
                let executor = adapter_executor(&self.grant_retry);
                match executor
                    .execute(|| self.differ.diff_updated(current, old_role_id, new_role_id))
                    .await
                {
                    Ok(diff) => self.apply_grant_diff(person_id, diff, &mut report).await,
                    Err(err) => report.record_error("compute grant diff", &err),
                }
            }
            PersonEvent::ContextRemoved { person_id, removed_role_id, remaining } => {
                self.run_reconcile(person_id, remaining, &mut report).await;
                let executor = adapter_executor(&self.grant_retry);
                match executor
                    .execute(|| self.differ.diff_removed(remaining, removed_role_id))
                    .await
                {
                    Ok(diff) => self.apply_grant_diff(person_id, diff, &mut report).await,
                    Err(err) => report.record_error("compute grant diff", &err),
                }
            }
            PersonEvent::PersonDeleted { person_id } => {
                self.on_person_deleted(person_id, &mut report).await;
            }
        }

        if report.is_clean() {
            info!(
                updated = report.reconcile.as_ref().map_or(0, |s| s.updated),
                deleted = report.reconcile.as_ref().map_or(0, |s| s.deleted),
                granted = report.granted,
                revoked = report.revoked,
                "event processed"
            );
        } else {
            warn!(errors = report.errors.len(), "event processed with failures");
        }
        report
    }

    /// Re-run membership reconciliation against a previously captured
    /// snapshot, without touching identities or grants.
    ///
    /// This is the replay path for snapshots whose original event left remote
    /// state unconverged.
    #[instrument(skip(self, assignments), fields(person_id = %person_id))]
    pub async fn resync_memberships(
        &self,
        person_id: &str,
        assignments: &[RoleAssignment],
    ) -> SyncReport {
        let mut report = SyncReport::new(person_id, "resync");
        self.run_reconcile(person_id, assignments, &mut report).await;
        if report.is_clean() {
            info!(
                updated = report.reconcile.as_ref().map_or(0, |s| s.updated),
                deleted = report.reconcile.as_ref().map_or(0, |s| s.deleted),
                "resync converged"
            );
        } else {
            warn!(errors = report.errors.len(), "resync left remote state unconverged");
        }
        report
    }

    async fn on_person_created(
        &self,
        person: &IdentityParams,
        assignments: &[RoleAssignment],
        report: &mut SyncReport,
    ) {
        for system in &self.identity_systems {
            let target = system.adapter.system();
            let executor = adapter_executor(&system.retry);
            match executor.execute(|| system.adapter.create_identity(person)).await {
                Ok(external_id) => {
                    debug!(system = %target, external_id = %external_id, "identity created");
                    report.identities_created += 1;
                    if let Err(err) = self.registry.record(person, target, &external_id).await {
                        report.record_error(format!("record {target} id"), &err);
                    }
                }
                Err(err) => {
                    warn!(system = %target, error = %err, "identity creation failed");
                    report.record_error(format!("create identity in {target}"), &err);
                }
            }
        }

        self.run_reconcile(&person.person_id, assignments, report).await;

        let executor = adapter_executor(&self.grant_retry);
        match executor.execute(|| self.differ.initial_grants(assignments)).await {
            Ok(names) => {
                let diff = GrantDiff { grant: names, revoke: BTreeSet::new() };
                self.apply_grant_diff(&person.person_id, diff, report).await;
            }
            Err(err) => report.record_error("resolve initial grants", &err),
        }
    }

    async fn on_person_deleted(&self, person_id: &str, report: &mut SyncReport) {
        match self.reconciler.remove_all(person_id).await {
            Ok(summary) => report.reconcile = Some(summary),
            Err(err) => report.record_error("read remote memberships", &err),
        }

        let identity = match self.registry.get(person_id).await {
            Ok(identity) => identity,
            Err(err) => {
                report.record_error("load identity registry entry", &err);
                None
            }
        };

        if let Some(identity) = identity {
            for system in &self.identity_systems {
                let target = system.adapter.system();
                let Some(external_id) = identity.external_id(target) else {
                    continue;
                };
                let executor = adapter_executor(&system.retry);
                match executor.execute(|| system.adapter.delete_identity(external_id)).await {
                    Ok(()) => report.identities_deleted += 1,
                    Err(AdapterError::NotFound(_)) => {
                        debug!(system = %target, "identity already gone");
                    }
                    Err(err) => {
                        report.record_error(format!("delete identity in {target}"), &err);
                    }
                }
            }
        }

        if let Err(err) = self.registry.remove(person_id).await {
            report.record_error("purge identity registry entry", &err);
        }
    }

    async fn run_reconcile(
        &self,
        person_id: &str,
        assignments: &[RoleAssignment],
        report: &mut SyncReport,
    ) {
        match self.reconciler.reconcile(person_id, assignments).await {
            Ok(summary) => report.reconcile = Some(summary),
            Err(err) => report.record_error("read remote memberships", &err),
        }
    }

    async fn apply_grant_diff(&self, person_id: &str, diff: GrantDiff, report: &mut SyncReport) {
        if diff.is_noop() {
            return;
        }
        let executor = adapter_executor(&self.grant_retry);
        for name in &diff.grant {
            match executor.execute(|| self.grants.grant(person_id, name)).await {
                Ok(()) => report.granted += 1,
                Err(err) => report.record_error(format!("grant {name}"), &err),
            }
        }
        for name in &diff.revoke {
            match executor.execute(|| self.grants.revoke(person_id, name)).await {
                Ok(()) => report.revoked += 1,
                Err(err) => report.record_error(format!("revoke {name}"), &err),
            }
        }
    }
}
