//! Event-driven sync runtime
//!
//! - EventWorker: consumes domain events, one task per event, plus a
//!   periodic backlog sweep
//! - RetryBacklog: latest-wins store of assignment snapshots whose sync
//!   left remote state unconverged
//!
//! Lifecycle is explicit: join handles are tracked, cancellation goes
//! through a token, and stop waits with a bounded join timeout.

pub mod backlog;
pub mod event_worker;

pub use backlog::RetryBacklog;
pub use event_worker::{EventHandler, EventWorker};
