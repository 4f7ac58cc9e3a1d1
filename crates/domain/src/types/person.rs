//! Person identity and external-system identifiers

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The external systems a person can be provisioned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSystem {
    Directory,
    Groupware,
    LearningPlatform,
    AuthProvider,
}

impl ExternalSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Groupware => "groupware",
            Self::LearningPlatform => "learning_platform",
            Self::AuthProvider => "auth_provider",
        }
    }
}

impl std::fmt::Display for ExternalSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a person in an external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityParams {
    pub person_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl IdentityParams {
    /// Domain part of the email address, used to resolve the directory root
    /// group. Empty when the address has no `@`.
    pub fn email_domain(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map_or("", |(_, domain)| domain)
    }
}

/// A person's provisioning state across external systems.
///
/// Created on the first successful provisioning into any system. Each
/// external id is written exactly once per system; rename flows update remote
/// attributes, never the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub person_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default)]
    pub external_ids: BTreeMap<ExternalSystem, String>,
    pub created_at: DateTime<Utc>,
}

impl PersonIdentity {
    pub fn new(person_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            username: username.into(),
            referrer: None,
            external_ids: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn external_id(&self, system: ExternalSystem) -> Option<&str> {
        self.external_ids.get(&system).map(String::as_str)
    }

    /// Records the external id assigned by `system`.
    ///
    /// Set-once: recording the same id again is an idempotent no-op, while a
    /// differing id for an already-provisioned system is rejected.
    pub fn record_external_id(
        &mut self,
        system: ExternalSystem,
        external_id: impl Into<String>,
    ) -> Result<(), DomainError> {
        let external_id = external_id.into();
        match self.external_ids.get(&system) {
            None => {
                self.external_ids.insert(system, external_id);
                Ok(())
            }
            Some(existing) if *existing == external_id => Ok(()),
            Some(existing) => Err(DomainError::InvalidInput(format!(
                "external id for {system} already set to {existing}, refusing {external_id}"
            ))),
        }
    }
}
