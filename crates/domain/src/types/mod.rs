//! Domain types and models

pub mod config;
pub mod events;
pub mod membership;
pub mod person;
pub mod role;

// Re-export the working set so callers can use `stellwerk_domain::RoleKind`
pub use config::{
    AuthProviderConfig, BackoffKind, Config, DirectoryConfig, GroupwareConfig, LearningConfig,
    ReconcileSettings, RetrySettings, SyncSettings,
};
pub use events::{EventEnvelope, PersonEvent};
pub use membership::{
    membership_key, ItemOutcome, ItemStatus, MassResult, MembershipParams, MembershipStatus,
    RemoteMembership, RoleAssignment,
};
pub use person::{ExternalSystem, IdentityParams, PersonIdentity};
pub use role::RoleKind;
