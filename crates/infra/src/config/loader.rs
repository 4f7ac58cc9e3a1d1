//! Configuration loader
//!
//! Builds the immutable [`Config`] the process runs with.
//!
//! ## Loading Strategy
//! 1. Starts from a TOML config file if one is found
//! 2. Falls back to built-in defaults when no file exists
//! 3. Applies `STELLWERK_*` environment variable overrides on top
//!
//! Secrets (bind password, groupware/learning passwords, client secret) come
//! only from the environment: values a config file carries for them are
//! discarded before the override pass.
//!
//! ## Environment Variables
//! - `STELLWERK_CONFIG`: Explicit config file path (must exist if set)
//! - `STELLWERK_EVENT_QUEUE_CAPACITY`: Event channel capacity
//! - `STELLWERK_JOIN_TIMEOUT_SECS`: Worker shutdown join timeout
//! - `STELLWERK_BACKLOG_SWEEP_SECS`: Retry backlog sweep interval
//! - `STELLWERK_BACKLOG_MAX_ATTEMPTS`: Retry backlog attempt ceiling
//! - `STELLWERK_ROOT_GROUPS`: Comma-separated root group ids
//! - `STELLWERK_AGGREGATION_CEILING`: Highest role that aggregates into roots
//! - `STELLWERK_DIRECTORY_URL`: Directory service URL
//! - `STELLWERK_DIRECTORY_BIND_DN`: Directory bind DN
//! - `STELLWERK_DIRECTORY_BIND_PASSWORD`: Directory bind password
//! - `STELLWERK_DIRECTORY_BASE_DN`: Directory base DN
//! - `STELLWERK_DOMAIN_ROOT_GROUPS`: `domain=root-group` pairs, comma-separated
//! - `STELLWERK_DIRECTORY_TIMEOUT_SECS`: Directory call timeout
//! - `STELLWERK_GROUPWARE_ENDPOINT`: Groupware webservice endpoint
//! - `STELLWERK_GROUPWARE_LOGIN`: Groupware admin login
//! - `STELLWERK_GROUPWARE_PASSWORD`: Groupware admin password
//! - `STELLWERK_GROUPWARE_CONTEXT_ID`: Groupware context id
//! - `STELLWERK_GROUPWARE_TIMEOUT_SECS`: Groupware call timeout
//! - `STELLWERK_LEARNING_ENDPOINT`: Learning platform mass endpoint
//! - `STELLWERK_LEARNING_USERNAME`: Learning platform basic-auth user
//! - `STELLWERK_LEARNING_PASSWORD`: Learning platform basic-auth password
//! - `STELLWERK_LEARNING_TIMEOUT_SECS`: Learning platform call timeout
//! - `STELLWERK_AUTH_BASE_URL`: Auth provider base URL
//! - `STELLWERK_AUTH_REALM`: Auth provider realm
//! - `STELLWERK_AUTH_CLIENT_ID`: Auth provider client id
//! - `STELLWERK_AUTH_CLIENT_SECRET`: Auth provider client secret
//! - `STELLWERK_AUTH_TOKEN_REFRESH_MARGIN_SECS`: Token early-refresh margin
//! - `STELLWERK_AUTH_TIMEOUT_SECS`: Auth provider call timeout
//!
//! Retry settings come from the file layer only.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./stellwerk.toml` or `./config.toml` (current working directory)
//! 2. `../stellwerk.toml` or `../config.toml` (parent directory)
//! 3. `../../stellwerk.toml` or `../../config.toml` (grandparent directory)
//! 4. Relative to executable location

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use stellwerk_domain::{Config, DomainError, Result};

/// Load configuration with the full layering strategy
///
/// Reads the config file named by `STELLWERK_CONFIG` (or the first probed
/// file), starts from built-in defaults when none exists, then applies
/// environment overrides.
///
/// # Errors
/// Returns `DomainError::Config` if:
/// - `STELLWERK_CONFIG` names a missing file
/// - A found file is not valid TOML
/// - An environment override has an invalid value
pub fn load() -> Result<Config> {
    let mut base = match std::env::var("STELLWERK_CONFIG").ok() {
        Some(explicit) => load_from_file(&PathBuf::from(explicit))?,
        None => match probe_config_paths() {
            Some(found) => load_from_file(&found)?,
            None => {
                tracing::debug!("no config file found, starting from defaults");
                Config::default()
            }
        },
    };

    // Secrets come only from the environment
    base.directory.bind_password.clear();
    base.groupware.password.clear();
    base.learning.password.clear();
    base.auth_provider.client_secret.clear();

    apply_env_overrides(base)
}

/// Load configuration from a TOML file
///
/// Missing fields fall back to their serde defaults, so a partial file is
/// valid.
///
/// # Errors
/// Returns `DomainError::Config` if the file does not exist or is not valid
/// TOML.
pub fn load_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(DomainError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| DomainError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&contents)
        .map_err(|e| DomainError::Config(format!("Invalid TOML format: {}", e)))
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./stellwerk.toml`, `./config.toml`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("stellwerk.toml"),
            cwd.join("config.toml"),
            cwd.join("../stellwerk.toml"),
            cwd.join("../config.toml"),
            cwd.join("../../stellwerk.toml"),
            cwd.join("../../config.toml"),
        ]);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("stellwerk.toml"),
                exe_dir.join("config.toml"),
                exe_dir.join("../stellwerk.toml"),
                exe_dir.join("../config.toml"),
            ]);
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

/// Apply `STELLWERK_*` environment variable overrides to a base config
///
/// # Errors
/// Returns `DomainError::Config` if a set variable has an unparseable value.
fn apply_env_overrides(mut config: Config) -> Result<Config> {
    env_override("STELLWERK_EVENT_QUEUE_CAPACITY", &mut config.sync.event_queue_capacity)?;
    env_override("STELLWERK_JOIN_TIMEOUT_SECS", &mut config.sync.join_timeout_secs)?;
    env_override("STELLWERK_BACKLOG_SWEEP_SECS", &mut config.sync.backlog_sweep_secs)?;
    env_override("STELLWERK_BACKLOG_MAX_ATTEMPTS", &mut config.sync.backlog_max_attempts)?;

    if let Ok(raw) = std::env::var("STELLWERK_ROOT_GROUPS") {
        config.reconcile.root_groups = parse_list(&raw);
    }
    env_override("STELLWERK_AGGREGATION_CEILING", &mut config.reconcile.aggregation_ceiling)?;

    env_text("STELLWERK_DIRECTORY_URL", &mut config.directory.url);
    env_text("STELLWERK_DIRECTORY_BIND_DN", &mut config.directory.bind_dn);
    env_text("STELLWERK_DIRECTORY_BIND_PASSWORD", &mut config.directory.bind_password);
    env_text("STELLWERK_DIRECTORY_BASE_DN", &mut config.directory.base_dn);
    if let Ok(raw) = std::env::var("STELLWERK_DOMAIN_ROOT_GROUPS") {
        config.directory.domain_root_groups = parse_pair_map(&raw)?;
    }
    env_override("STELLWERK_DIRECTORY_TIMEOUT_SECS", &mut config.directory.timeout_secs)?;

    env_text("STELLWERK_GROUPWARE_ENDPOINT", &mut config.groupware.endpoint);
    env_text("STELLWERK_GROUPWARE_LOGIN", &mut config.groupware.login);
    env_text("STELLWERK_GROUPWARE_PASSWORD", &mut config.groupware.password);
    env_override("STELLWERK_GROUPWARE_CONTEXT_ID", &mut config.groupware.context_id)?;
    env_override("STELLWERK_GROUPWARE_TIMEOUT_SECS", &mut config.groupware.timeout_secs)?;

    env_text("STELLWERK_LEARNING_ENDPOINT", &mut config.learning.endpoint);
    env_text("STELLWERK_LEARNING_USERNAME", &mut config.learning.username);
    env_text("STELLWERK_LEARNING_PASSWORD", &mut config.learning.password);
    env_override("STELLWERK_LEARNING_TIMEOUT_SECS", &mut config.learning.timeout_secs)?;

    env_text("STELLWERK_AUTH_BASE_URL", &mut config.auth_provider.base_url);
    env_text("STELLWERK_AUTH_REALM", &mut config.auth_provider.realm);
    env_text("STELLWERK_AUTH_CLIENT_ID", &mut config.auth_provider.client_id);
    env_text("STELLWERK_AUTH_CLIENT_SECRET", &mut config.auth_provider.client_secret);
    env_override(
        "STELLWERK_AUTH_TOKEN_REFRESH_MARGIN_SECS",
        &mut config.auth_provider.token_refresh_margin_secs,
    )?;
    env_override("STELLWERK_AUTH_TIMEOUT_SECS", &mut config.auth_provider.timeout_secs)?;

    Ok(config)
}

/// Overwrite `slot` with the variable's value when it is set
fn env_text(key: &str, slot: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *slot = value;
    }
}

/// Parse the variable into `slot` when it is set
///
/// # Errors
/// Returns `DomainError::Config` if the value does not parse.
fn env_override<T>(key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .parse::<T>()
            .map_err(|e| DomainError::Config(format!("Invalid value for {}: {}", key, e)))?;
    }
    Ok(())
}

/// Split a comma-separated list, dropping empty segments
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

/// Parse `domain=root-group` pairs, comma-separated
///
/// Domains are lowercased on the way in so lookup stays case-insensitive.
fn parse_pair_map(raw: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (domain, group) = pair.split_once('=').ok_or_else(|| {
            DomainError::Config(format!(
                "Invalid domain mapping '{}', expected domain=root-group",
                pair
            ))
        })?;
        map.insert(domain.trim().to_lowercase(), group.trim().to_owned());
    }
    Ok(map)
}
