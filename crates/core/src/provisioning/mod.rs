//! Identity and membership provisioning engine
//!
//! A domain event carries the post-change Personenkontext snapshot; the
//! service computes the remote deltas and applies them through the ports,
//! each call wrapped in bounded retries.

pub mod grants;
pub mod ports;
pub mod reconciler;
pub mod report;
pub mod retry;
pub mod service;

pub use grants::{GrantDiff, RoleGrantDiffer};
pub use ports::*;
pub use reconciler::{BatchFailure, BatchKind, MembershipReconciler, ReconcilePlan, ReconcileSummary};
pub use report::{SyncError, SyncReport};
pub use retry::{adapter_executor, retry_config, AdapterRetryPolicy};
pub use service::ProvisioningService;
