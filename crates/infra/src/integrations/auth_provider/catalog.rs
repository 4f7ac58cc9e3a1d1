//! Config-backed role catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use stellwerk_core::RoleCatalog;
use stellwerk_domain::{AdapterError, AdapterResult};

/// Resolves role ids to provider role names from the static mapping in
/// configuration. A role id without a mapping cannot be granted.
#[derive(Debug, Clone, Default)]
pub struct ConfigRoleCatalog {
    mappings: HashMap<String, Vec<String>>,
}

impl ConfigRoleCatalog {
    pub fn new(mappings: HashMap<String, Vec<String>>) -> Self {
        Self { mappings }
    }
}

#[async_trait]
impl RoleCatalog for ConfigRoleCatalog {
    async fn permission_names(&self, role_id: &str) -> AdapterResult<Vec<String>> {
        self.mappings.get(role_id).cloned().ok_or_else(|| {
            AdapterError::NotFound(format!("no permission mapping for role {role_id}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mapped_roles_resolve() {
        let catalog = ConfigRoleCatalog::new(HashMap::from([(
            "role-lehr".to_owned(),
            vec!["teachers".to_owned(), "staff".to_owned()],
        )]));
        let names = catalog.permission_names("role-lehr").await.unwrap();
        assert_eq!(names, vec!["teachers", "staff"]);
    }

    #[tokio::test]
    async fn unmapped_roles_are_not_found() {
        let catalog = ConfigRoleCatalog::default();
        let err = catalog.permission_names("role-x").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotFound(_)));
    }
}
