//! # Stellwerk Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The membership reconciliation engine
//! - Grant/revoke diffing for auth-provider roles
//! - Port/adapter interfaces (traits)
//! - The event-driven provisioning service
//!
//! ## Architecture Principles
//! - Only depends on `stellwerk-common` and `stellwerk-domain`
//! - No HTTP, LDAP, or SOAP code
//! - All external systems via traits
//! - Pure, testable reconciliation logic

pub mod provisioning;

// Re-export specific items to avoid ambiguity
pub use provisioning::ports::{DirectoryAdapter, IdentityRegistry, RoleCatalog, RoleGrantPort};
pub use provisioning::{
    AdapterRetryPolicy, BatchFailure, BatchKind, GrantDiff, MembershipReconciler,
    ProvisioningService, ReconcilePlan, ReconcileSummary, RoleGrantDiffer, SyncError, SyncReport,
};
