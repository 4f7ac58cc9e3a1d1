//! In-memory identity registry
//!
//! Holds the external ids assigned per person across systems. State lives in
//! the process; the engine repopulates it through person-created events and
//! tolerates re-provisioning because every adapter create is idempotent.

use async_trait::async_trait;
use dashmap::DashMap;
use stellwerk_core::IdentityRegistry;
use stellwerk_domain::{ExternalSystem, IdentityParams, PersonIdentity, Result};

/// Concurrent map of person id to provisioning state.
#[derive(Debug, Default)]
pub struct InMemoryIdentityRegistry {
    entries: DashMap<String, PersonIdentity>,
}

impl InMemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityRegistry for InMemoryIdentityRegistry {
    async fn get(&self, person_id: &str) -> Result<Option<PersonIdentity>> {
        Ok(self.entries.get(person_id).map(|entry| entry.value().clone()))
    }

    async fn record(
        &self,
        person: &IdentityParams,
        system: ExternalSystem,
        external_id: &str,
    ) -> Result<()> {
        let mut entry = self.entries.entry(person.person_id.clone()).or_insert_with(|| {
            let mut identity =
                PersonIdentity::new(person.person_id.clone(), person.username.clone());
            identity.referrer = person.referrer.clone();
            identity
        });
        entry.record_external_id(system, external_id)
    }

    async fn remove(&self, person_id: &str) -> Result<()> {
        self.entries.remove(person_id);
        Ok(())
    }
}
