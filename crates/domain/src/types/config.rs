//! Configuration structures
//!
//! One immutable [`Config`] is built at startup (environment first, file
//! fallback, hard-coded defaults last) and injected into every adapter.
//! Nothing reads configuration ambiently.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKLOG_MAX_ATTEMPTS, DEFAULT_BACKLOG_SWEEP_SECS, DEFAULT_EVENT_QUEUE_CAPACITY,
    DEFAULT_JOIN_TIMEOUT_SECS, DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_ROOT_GROUPS,
};
use crate::errors::DomainError;
use crate::types::role::RoleKind;

/// Shape of the inter-attempt delay curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// One constant delay across all attempts.
    #[default]
    Fixed,
    /// Delay grows with the cube of the attempt number.
    Cubic,
}

/// Per-adapter retry parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_attempts == 0 {
            return Err(DomainError::Config("retry max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            delay_ms: default_retry_delay_ms(),
            backoff: BackoffKind::default(),
        }
    }
}

/// Sync worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    #[serde(default = "default_backlog_sweep_secs")]
    pub backlog_sweep_secs: u64,
    #[serde(default = "default_backlog_max_attempts")]
    pub backlog_max_attempts: u32,
}

impl SyncSettings {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn backlog_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.backlog_sweep_secs)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            event_queue_capacity: default_event_queue_capacity(),
            join_timeout_secs: default_join_timeout_secs(),
            backlog_sweep_secs: default_backlog_sweep_secs(),
            backlog_max_attempts: default_backlog_max_attempts(),
        }
    }
}

/// Group topology the reconciler needs: which groups aggregate privilege and
/// how high aggregation may reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    #[serde(default = "default_root_groups")]
    pub root_groups: Vec<String>,
    #[serde(default = "default_aggregation_ceiling")]
    pub aggregation_ceiling: RoleKind,
}

impl ReconcileSettings {
    pub fn is_root_group(&self, group_id: &str) -> bool {
        self.root_groups.iter().any(|g| g == group_id)
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            root_groups: default_root_groups(),
            aggregation_ceiling: default_aggregation_ceiling(),
        }
    }
}

/// Directory service (LDAP) connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_url")]
    pub url: String,
    #[serde(default = "default_bind_dn")]
    pub bind_dn: String,
    /// Supplied via environment only; never written to a config file.
    #[serde(default)]
    pub bind_password: String,
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
    /// Email/organization domain to root-group OU name. A person whose
    /// domain matches no entry cannot be provisioned into the directory.
    #[serde(default)]
    pub domain_root_groups: HashMap<String, String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Maps an email/organization domain to its root-group OU name.
    pub fn resolve_root_group(&self, email_domain: &str) -> Result<&str, DomainError> {
        let needle = email_domain.to_lowercase();
        self.domain_root_groups
            .get(&needle)
            .map(String::as_str)
            .ok_or_else(|| DomainError::UnmappedDomain(needle))
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: default_directory_url(),
            bind_dn: default_bind_dn(),
            bind_password: String::new(),
            base_dn: default_base_dn(),
            domain_root_groups: HashMap::new(),
            timeout_secs: default_remote_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

/// Groupware platform (SOAP) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupwareConfig {
    #[serde(default = "default_groupware_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_groupware_login")]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_groupware_context_id")]
    pub context_id: u32,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl GroupwareConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GroupwareConfig {
    fn default() -> Self {
        Self {
            endpoint: default_groupware_endpoint(),
            login: default_groupware_login(),
            password: String::new(),
            context_id: default_groupware_context_id(),
            timeout_secs: default_remote_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

/// Learning platform (IMS-ES mass actions) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_learning_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_learning_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl LearningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_learning_endpoint(),
            username: default_learning_username(),
            password: String::new(),
            timeout_secs: default_remote_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

/// Auth provider (REST) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    #[serde(default = "default_auth_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_auth_provider_realm")]
    pub realm: String,
    #[serde(default = "default_auth_provider_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Tokens are evicted from the cache this long before they expire.
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
    /// Upstream role id to the provider role names it implies. Role ids
    /// missing here cannot be granted.
    #[serde(default)]
    pub role_mappings: HashMap<String, Vec<String>>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl AuthProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }
}

impl Default for AuthProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_auth_provider_base_url(),
            realm: default_auth_provider_realm(),
            client_id: default_auth_provider_client_id(),
            client_secret: String::new(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
            role_mappings: HashMap::new(),
            timeout_secs: default_remote_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

/// Root configuration for the whole process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub groupware: GroupwareConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub auth_provider: AuthProviderConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.directory.retry.validate()?;
        self.groupware.retry.validate()?;
        self.learning.retry.validate()?;
        self.auth_provider.retry.validate()?;
        if self.reconcile.root_groups.is_empty() {
            return Err(DomainError::Config("at least one root group must be configured".into()));
        }
        Ok(())
    }
}

fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

fn default_event_queue_capacity() -> usize {
    DEFAULT_EVENT_QUEUE_CAPACITY
}

fn default_join_timeout_secs() -> u64 {
    DEFAULT_JOIN_TIMEOUT_SECS
}

fn default_backlog_sweep_secs() -> u64 {
    DEFAULT_BACKLOG_SWEEP_SECS
}

fn default_backlog_max_attempts() -> u32 {
    DEFAULT_BACKLOG_MAX_ATTEMPTS
}

fn default_root_groups() -> Vec<String> {
    DEFAULT_ROOT_GROUPS.iter().map(|g| (*g).to_owned()).collect()
}

fn default_aggregation_ceiling() -> RoleKind {
    RoleKind::Lehr
}

fn default_directory_url() -> String {
    "ldap://localhost:389".to_owned()
}

fn default_bind_dn() -> String {
    "cn=admin,dc=example,dc=org".to_owned()
}

fn default_base_dn() -> String {
    "dc=example,dc=org".to_owned()
}

fn default_groupware_endpoint() -> String {
    "http://localhost:8009/webservices".to_owned()
}

fn default_groupware_login() -> String {
    "oxadmin".to_owned()
}

fn default_groupware_context_id() -> u32 {
    10
}

fn default_learning_endpoint() -> String {
    "http://localhost:8010/ims/mass".to_owned()
}

fn default_learning_username() -> String {
    "stellwerk".to_owned()
}

fn default_auth_provider_base_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_auth_provider_realm() -> String {
    "stellwerk".to_owned()
}

fn default_auth_provider_client_id() -> String {
    "stellwerk-sync".to_owned()
}

fn default_token_refresh_margin_secs() -> u64 {
    30
}
