//! Observability infrastructure
//!
//! Thread-safe sync counters, exposed as snapshots for logging and tests.
//! Subscriber installation lives in the binary, not here.

pub mod metrics;

// Re-export metric types for convenience
pub use metrics::{MetricsSnapshot, SyncMetrics};
