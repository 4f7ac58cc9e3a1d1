//! Mock port implementations for provisioning tests
//!
//! In-memory doubles for all provisioning ports with call recorders, enabling
//! deterministic tests without remote systems. The directory mock applies
//! upserts and deletes to its own state so a repeated reconciliation observes
//! the converged result.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use stellwerk_core::provisioning::ports::{
    DirectoryAdapter, IdentityRegistry, RoleCatalog, RoleGrantPort,
};
use stellwerk_domain::errors::AdapterError;
use stellwerk_domain::{
    AdapterResult, ExternalSystem, IdentityParams, ItemOutcome, MassResult, MembershipParams,
    MembershipStatus, PersonIdentity, RemoteMembership, Result as DomainResult, RoleKind,
};
use tokio::sync::Mutex;

/// In-memory stand-in for one external identity/membership system.
pub struct MockDirectoryAdapter {
    system: ExternalSystem,
    memberships: Mutex<Vec<RemoteMembership>>,
    read_calls: AtomicU32,
    upsert_calls: Mutex<Vec<Vec<MembershipParams>>>,
    delete_calls: Mutex<Vec<Vec<String>>>,
    created: Mutex<Vec<IdentityParams>>,
    deleted_identities: Mutex<Vec<String>>,
    failing_reads: AtomicU32,
    upsert_error: Mutex<Option<AdapterError>>,
    delete_error: Mutex<Option<AdapterError>>,
    create_error: Mutex<Option<AdapterError>>,
    identity_delete_error: Mutex<Option<AdapterError>>,
    failing_items: Mutex<HashSet<String>>,
}

impl MockDirectoryAdapter {
    pub fn new(system: ExternalSystem) -> Self {
        Self {
            system,
            memberships: Mutex::new(Vec::new()),
            read_calls: AtomicU32::new(0),
            upsert_calls: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            deleted_identities: Mutex::new(Vec::new()),
            failing_reads: AtomicU32::new(0),
            upsert_error: Mutex::new(None),
            delete_error: Mutex::new(None),
            create_error: Mutex::new(None),
            identity_delete_error: Mutex::new(None),
            failing_items: Mutex::new(HashSet::new()),
        }
    }

    /// Seed the remote state this mock starts with.
    pub fn seeded(system: ExternalSystem, memberships: Vec<RemoteMembership>) -> Self {
        let mut adapter = Self::new(system);
        *adapter.memberships.get_mut() = memberships;
        adapter
    }

    /// The next `count` reads fail with a transport error.
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// The next upsert batch fails as a whole with `error`.
    pub async fn fail_next_upsert(&self, error: AdapterError) {
        *self.upsert_error.lock().await = Some(error);
    }

    /// The next delete batch fails as a whole with `error`.
    pub async fn fail_next_delete(&self, error: AdapterError) {
        *self.delete_error.lock().await = Some(error);
    }

    /// The next identity creation fails with `error`.
    pub async fn fail_next_create(&self, error: AdapterError) {
        *self.create_error.lock().await = Some(error);
    }

    /// The next identity deletion fails with `error`.
    pub async fn fail_next_identity_delete(&self, error: AdapterError) {
        *self.identity_delete_error.lock().await = Some(error);
    }

    /// Every batch item with this membership id fails while the batch itself
    /// completes.
    pub async fn fail_item(&self, membership_id: &str) {
        self.failing_items.lock().await.insert(membership_id.to_owned());
    }

    pub fn read_count(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub async fn upsert_batches(&self) -> Vec<Vec<MembershipParams>> {
        self.upsert_calls.lock().await.clone()
    }

    pub async fn delete_batches(&self) -> Vec<Vec<String>> {
        self.delete_calls.lock().await.clone()
    }

    pub async fn created_identities(&self) -> Vec<IdentityParams> {
        self.created.lock().await.clone()
    }

    pub async fn deleted_identity_ids(&self) -> Vec<String> {
        self.deleted_identities.lock().await.clone()
    }

    /// Snapshot of the mock's remote state, sorted by group id.
    pub async fn state(&self) -> Vec<RemoteMembership> {
        let mut memberships = self.memberships.lock().await.clone();
        memberships.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        memberships
    }

    /// Role currently stored for a group, if a membership exists.
    pub async fn role_of(&self, group_id: &str) -> Option<RoleKind> {
        self.memberships
            .lock()
            .await
            .iter()
            .find(|membership| membership.group_id == group_id)
            .map(|membership| membership.role)
    }

    /// Drop the call recorders, keeping the remote state.
    pub async fn reset_recorders(&self) {
        self.read_calls.store(0, Ordering::SeqCst);
        self.upsert_calls.lock().await.clear();
        self.delete_calls.lock().await.clear();
    }
}

#[async_trait]
impl DirectoryAdapter for MockDirectoryAdapter {
    fn system(&self) -> ExternalSystem {
        self.system
    }

    async fn read_memberships(&self, person_id: &str) -> AdapterResult<Vec<RemoteMembership>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(AdapterError::Transport("connection reset".into()));
        }
        Ok(self
            .memberships
            .lock()
            .await
            .iter()
            .filter(|membership| membership.person_id == person_id)
            .cloned()
            .collect())
    }

    async fn upsert_memberships(&self, params: Vec<MembershipParams>) -> AdapterResult<MassResult> {
        self.upsert_calls.lock().await.push(params.clone());
        if let Some(error) = self.upsert_error.lock().await.take() {
            return Err(error);
        }
        let failing = self.failing_items.lock().await;
        let mut memberships = self.memberships.lock().await;
        let mut outcomes = Vec::with_capacity(params.len());
        for p in params {
            let id = p.membership_id.clone();
            if failing.contains(&id) {
                outcomes.push(ItemOutcome::failed(id, "item rejected"));
                continue;
            }
            if let Some(existing) =
                memberships.iter_mut().find(|membership| membership.membership_id == id)
            {
                existing.role = p.role;
                existing.status = MembershipStatus::Active;
            } else {
                memberships.push(RemoteMembership {
                    membership_id: id.clone(),
                    group_id: p.group_id,
                    person_id: p.person_id,
                    role: p.role,
                    status: MembershipStatus::Active,
                });
            }
            outcomes.push(ItemOutcome::ok(id));
        }
        Ok(MassResult::new(outcomes))
    }

    async fn delete_memberships(&self, membership_ids: Vec<String>) -> AdapterResult<MassResult> {
        self.delete_calls.lock().await.push(membership_ids.clone());
        if let Some(error) = self.delete_error.lock().await.take() {
            return Err(error);
        }
        let failing = self.failing_items.lock().await;
        let mut memberships = self.memberships.lock().await;
        let mut outcomes = Vec::with_capacity(membership_ids.len());
        for id in membership_ids {
            if failing.contains(&id) {
                outcomes.push(ItemOutcome::failed(id, "item rejected"));
                continue;
            }
            memberships.retain(|membership| membership.membership_id != id);
            outcomes.push(ItemOutcome::ok(id));
        }
        Ok(MassResult::new(outcomes))
    }

    async fn create_identity(&self, params: &IdentityParams) -> AdapterResult<String> {
        if let Some(error) = self.create_error.lock().await.take() {
            return Err(error);
        }
        self.created.lock().await.push(params.clone());
        Ok(format!("{}-{}", self.system.as_str(), params.username))
    }

    async fn delete_identity(&self, external_id: &str) -> AdapterResult<()> {
        if let Some(error) = self.identity_delete_error.lock().await.take() {
            return Err(error);
        }
        self.deleted_identities.lock().await.push(external_id.to_owned());
        Ok(())
    }
}

/// Static role-id to permission-name catalog.
#[derive(Default)]
pub struct MockRoleCatalog {
    names: HashMap<String, Vec<String>>,
}

impl MockRoleCatalog {
    pub fn new(entries: &[(&str, &[&str])]) -> Self {
        let names = entries
            .iter()
            .map(|(role_id, names)| {
                ((*role_id).to_owned(), names.iter().map(|n| (*n).to_owned()).collect())
            })
            .collect();
        Self { names }
    }
}

#[async_trait]
impl RoleCatalog for MockRoleCatalog {
    async fn permission_names(&self, role_id: &str) -> AdapterResult<Vec<String>> {
        self.names
            .get(role_id)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("role {role_id}")))
    }
}

/// Records grant/revoke calls, optionally failing the next grant.
#[derive(Default)]
pub struct MockRoleGrantPort {
    granted: Mutex<Vec<(String, String)>>,
    revoked: Mutex<Vec<(String, String)>>,
    grant_error: Mutex<Option<AdapterError>>,
}

impl MockRoleGrantPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next_grant(&self, error: AdapterError) {
        *self.grant_error.lock().await = Some(error);
    }

    pub async fn granted_names(&self) -> Vec<String> {
        self.granted.lock().await.iter().map(|(_, name)| name.clone()).collect()
    }

    pub async fn revoked_names(&self) -> Vec<String> {
        self.revoked.lock().await.iter().map(|(_, name)| name.clone()).collect()
    }
}

#[async_trait]
impl RoleGrantPort for MockRoleGrantPort {
    async fn grant(&self, person_id: &str, name: &str) -> AdapterResult<()> {
        if let Some(error) = self.grant_error.lock().await.take() {
            return Err(error);
        }
        self.granted.lock().await.push((person_id.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn revoke(&self, person_id: &str, name: &str) -> AdapterResult<()> {
        self.revoked.lock().await.push((person_id.to_owned(), name.to_owned()));
        Ok(())
    }
}

/// In-memory identity registry enforcing the set-once rule.
#[derive(Default)]
pub struct MockIdentityRegistry {
    identities: Mutex<HashMap<String, PersonIdentity>>,
}

impl MockIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, identity: PersonIdentity) {
        self.identities.lock().await.insert(identity.person_id.clone(), identity);
    }

    pub async fn snapshot(&self, person_id: &str) -> Option<PersonIdentity> {
        self.identities.lock().await.get(person_id).cloned()
    }
}

#[async_trait]
impl IdentityRegistry for MockIdentityRegistry {
    async fn get(&self, person_id: &str) -> DomainResult<Option<PersonIdentity>> {
        Ok(self.identities.lock().await.get(person_id).cloned())
    }

    async fn record(
        &self,
        person: &IdentityParams,
        system: ExternalSystem,
        external_id: &str,
    ) -> DomainResult<()> {
        let mut identities = self.identities.lock().await;
        let entry = identities.entry(person.person_id.clone()).or_insert_with(|| {
            let mut identity =
                PersonIdentity::new(person.person_id.clone(), person.username.clone());
            identity.referrer = person.referrer.clone();
            identity
        });
        entry.record_external_id(system, external_id)
    }

    async fn remove(&self, person_id: &str) -> DomainResult<()> {
        self.identities.lock().await.remove(person_id);
        Ok(())
    }
}
