//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application. Configuration may override any of these; they are the
//! hard-coded fallbacks.

// Retry fallbacks shared by every adapter section
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 15_000;

// Remote transport
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

// Root groups aggregating privilege across the whole org tree
pub const DEFAULT_ROOT_GROUPS: &[&str] = &["root-oeffentlich", "root-ersatz"];

// Composite membership key prefix: membership-<personId>-<groupId>
pub const MEMBERSHIP_KEY_PREFIX: &str = "membership";

// Sync worker fallbacks
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKLOG_SWEEP_SECS: u64 = 300;
pub const DEFAULT_BACKLOG_MAX_ATTEMPTS: u32 = 5;
