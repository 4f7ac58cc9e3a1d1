//! Per-event sync reports

use std::fmt;

use serde::Serialize;

use super::reconciler::ReconcileSummary;

/// One recorded failure with the step it happened in.
#[derive(Debug, Clone, Serialize)]
pub struct SyncError {
    pub context: String,
    pub message: String,
}

/// Aggregated outcome of handling one domain event.
///
/// The service reports instead of failing: the event dispatcher never sees an
/// error, it sees a report with the failures inside. Failed syncs converge
/// through a later reconciliation, not by rolling back the local change.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub person_id: String,
    pub event_kind: &'static str,
    pub identities_created: u32,
    pub identities_deleted: u32,
    pub granted: u32,
    pub revoked: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<ReconcileSummary>,
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    pub fn new(person_id: impl Into<String>, event_kind: &'static str) -> Self {
        Self {
            person_id: person_id.into(),
            event_kind,
            identities_created: 0,
            identities_deleted: 0,
            granted: 0,
            revoked: 0,
            reconcile: None,
            errors: Vec::new(),
        }
    }

    /// True when every step succeeded and the reconciliation converged.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
            && self.reconcile.as_ref().map_or(true, ReconcileSummary::is_converged)
    }

    pub fn record_error(&mut self, context: impl Into<String>, error: &dyn fmt::Display) {
        self.errors.push(SyncError { context: context.into(), message: error.to_string() });
    }
}
