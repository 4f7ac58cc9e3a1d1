//! Sync metrics for tracking reconciliation throughput and outcomes
//!
//! ## Design
//! - **Independent counters** with Relaxed ordering; nothing here derives one
//!   value from another
//! - **Snapshot reads** for logging and assertions, never live field access
//!   from other crates

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use stellwerk_core::SyncReport;

/// Counters for the sync engine.
///
/// One instance lives for the whole process, shared behind an `Arc` between
/// the worker and whoever wants to log summaries.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Events taken off the queue and handled
    pub events_processed: AtomicU64,
    /// Handled events whose report came back clean
    pub reconciliations_succeeded: AtomicU64,
    /// Handled events whose report carried errors or unconverged batches
    pub reconciliations_failed: AtomicU64,
    /// Memberships created or refreshed across all systems
    pub memberships_upserted: AtomicU64,
    /// Memberships removed across all systems
    pub memberships_deleted: AtomicU64,
    /// Auth-provider roles granted
    pub roles_granted: AtomicU64,
    /// Auth-provider roles revoked
    pub roles_revoked: AtomicU64,
    /// Backlog replays performed after an unconverged reconciliation
    pub retries_performed: AtomicU64,
}

impl SyncMetrics {
    /// Create new SyncMetrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one finished event report into the counters
    pub fn record_report(&self, report: &SyncReport) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        self.record_outcome(report);
    }

    /// Absorb a backlog-replay report. Replays count towards
    /// `retries_performed`, not `events_processed`.
    pub fn record_replay(&self, report: &SyncReport) {
        self.retries_performed.fetch_add(1, Ordering::Relaxed);
        self.record_outcome(report);
    }

    fn record_outcome(&self, report: &SyncReport) {
        if report.is_clean() {
            self.reconciliations_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reconciliations_failed.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(summary) = &report.reconcile {
            self.memberships_upserted.fetch_add(u64::from(summary.updated), Ordering::Relaxed);
            self.memberships_deleted.fetch_add(u64::from(summary.deleted), Ordering::Relaxed);
        }

        self.roles_granted.fetch_add(u64::from(report.granted), Ordering::Relaxed);
        self.roles_revoked.fetch_add(u64::from(report.revoked), Ordering::Relaxed);
    }

    /// Consistent-enough copy of all counters for logging and tests
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            reconciliations_succeeded: self.reconciliations_succeeded.load(Ordering::Relaxed),
            reconciliations_failed: self.reconciliations_failed.load(Ordering::Relaxed),
            memberships_upserted: self.memberships_upserted.load(Ordering::Relaxed),
            memberships_deleted: self.memberships_deleted.load(Ordering::Relaxed),
            roles_granted: self.roles_granted.load(Ordering::Relaxed),
            roles_revoked: self.roles_revoked.load(Ordering::Relaxed),
            retries_performed: self.retries_performed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_processed: u64,
    pub reconciliations_succeeded: u64,
    pub reconciliations_failed: u64,
    pub memberships_upserted: u64,
    pub memberships_deleted: u64,
    pub roles_granted: u64,
    pub roles_revoked: u64,
    pub retries_performed: u64,
}
