//! Port interfaces for provisioning operations

use async_trait::async_trait;
use stellwerk_domain::{
    AdapterResult, ExternalSystem, IdentityParams, MassResult, MembershipParams, PersonIdentity,
    RemoteMembership, Result,
};

/// Read/write access to one external identity/membership system.
///
/// Operations are retried by their caller, never internally, and must be safe
/// to invoke more than once: upserts land on the composite membership key and
/// deleting an absent record succeeds.
#[async_trait]
pub trait DirectoryAdapter: Send + Sync {
    /// Which external system this adapter fronts.
    fn system(&self) -> ExternalSystem;

    /// Read all memberships the system currently holds for a person.
    async fn read_memberships(&self, person_id: &str) -> AdapterResult<Vec<RemoteMembership>>;

    /// Create or refresh the given memberships in one batch.
    async fn upsert_memberships(&self, params: Vec<MembershipParams>) -> AdapterResult<MassResult>;

    /// Delete the given memberships in one batch.
    async fn delete_memberships(&self, membership_ids: Vec<String>) -> AdapterResult<MassResult>;

    /// Create the person's identity record, returning the assigned external id.
    async fn create_identity(&self, params: &IdentityParams) -> AdapterResult<String>;

    /// Delete the person's identity record.
    async fn delete_identity(&self, external_id: &str) -> AdapterResult<()>;
}

/// Resolves which external permission names a role implies.
#[async_trait]
pub trait RoleCatalog: Send + Sync {
    /// Permission names implied by the given role id.
    async fn permission_names(&self, role_id: &str) -> AdapterResult<Vec<String>>;
}

/// Grant/revoke of named roles at the auth provider.
#[async_trait]
pub trait RoleGrantPort: Send + Sync {
    /// Grant a named role to the person.
    async fn grant(&self, person_id: &str, name: &str) -> AdapterResult<()>;

    /// Revoke a named role from the person.
    async fn revoke(&self, person_id: &str, name: &str) -> AdapterResult<()>;
}

/// Bookkeeping of the external ids assigned to a person.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Load the provisioning state for a person, if any.
    async fn get(&self, person_id: &str) -> Result<Option<PersonIdentity>>;

    /// Record the external id a system assigned. Set-once per system: the
    /// same id again is a no-op, a differing one is rejected.
    async fn record(
        &self,
        person: &IdentityParams,
        system: ExternalSystem,
        external_id: &str,
    ) -> Result<()>;

    /// Drop all provisioning state for a person.
    async fn remove(&self, person_id: &str) -> Result<()>;
}
