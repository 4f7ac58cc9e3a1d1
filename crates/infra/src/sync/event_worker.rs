//! Event worker driving provisioning from the in-process event queue.
//!
//! Each received event is handled on its own task, so a slow remote system
//! stalls only the person it belongs to. A periodic sweep replays stored
//! snapshots from the [`RetryBacklog`] until they converge or exhaust their
//! attempts. Join handles are tracked and cancellation is explicit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stellwerk_domain::SyncSettings;
//! use stellwerk_infra::observability::SyncMetrics;
//! use stellwerk_infra::sync::{EventWorker, RetryBacklog};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), String> {
//! let settings = SyncSettings::default();
//! let (_sender, receiver) = mpsc::channel(settings.event_queue_capacity);
//! # let service = todo!(); // Arc<dyn EventHandler>
//! let mut worker = EventWorker::new(
//!     service,
//!     Arc::new(RetryBacklog::new()),
//!     Arc::new(SyncMetrics::new()),
//!     settings,
//!     receiver,
//! );
//!
//! worker.start().await?;
//! // ... events arrive through the sender half ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stellwerk_core::{ProvisioningService, SyncReport};
use stellwerk_domain::{EventEnvelope, PersonEvent, RoleAssignment, SyncSettings};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::SyncMetrics;
use crate::sync::backlog::RetryBacklog;

/// Provisioning entry points the worker drives.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply one domain event across the connected systems.
    async fn handle_event(&self, event: &PersonEvent) -> SyncReport;

    /// Replay a stored assignment snapshot for one person.
    async fn resync_memberships(
        &self,
        person_id: &str,
        assignments: &[RoleAssignment],
    ) -> SyncReport;
}

#[async_trait]
impl EventHandler for ProvisioningService {
    async fn handle_event(&self, event: &PersonEvent) -> SyncReport {
        ProvisioningService::handle_event(self, event).await
    }

    async fn resync_memberships(
        &self,
        person_id: &str,
        assignments: &[RoleAssignment],
    ) -> SyncReport {
        ProvisioningService::resync_memberships(self, person_id, assignments).await
    }
}

/// Event worker with explicit lifecycle management.
pub struct EventWorker {
    handler: Arc<dyn EventHandler>,
    backlog: Arc<RetryBacklog>,
    metrics: Arc<SyncMetrics>,
    settings: SyncSettings,
    receiver: Option<mpsc::Receiver<EventEnvelope>>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl EventWorker {
    /// Create a new worker owning the receiving half of the event queue.
    pub fn new(
        handler: Arc<dyn EventHandler>,
        backlog: Arc<RetryBacklog>,
        metrics: Arc<SyncMetrics>,
        settings: SyncSettings,
        receiver: mpsc::Receiver<EventEnvelope>,
    ) -> Self {
        Self {
            handler,
            backlog,
            metrics,
            settings,
            receiver: Some(receiver),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background processing task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Worker already running".to_string());
        }

        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| "Event receiver already consumed".to_string())?;

        info!("Starting event worker");

        // Create fresh cancellation token
        self.cancellation = CancellationToken::new();

        let handler = Arc::clone(&self.handler);
        let backlog = Arc::clone(&self.backlog);
        let metrics = Arc::clone(&self.metrics);
        let sweep_interval = self.settings.backlog_sweep_interval();
        let max_attempts = self.settings.backlog_max_attempts;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(
                handler,
                backlog,
                metrics,
                receiver,
                sweep_interval,
                max_attempts,
                cancel,
            )
            .await;
        });

        self.task_handle = Some(handle);
        info!("Event worker started");

        Ok(())
    }

    /// Stop the worker and wait for the processing task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Worker not running".to_string());
        }

        info!("Stopping event worker");

        // Cancel background task
        self.cancellation.cancel();

        // Await join handle with timeout
        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.settings.join_timeout();
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Worker task panicked: {}", e);
                    return Err("Worker task panicked".to_string());
                }
                Err(_) => {
                    warn!("Worker task did not complete within timeout");
                    return Err("Worker task timeout".to_string());
                }
            }
        }

        info!("Event worker stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when a worker instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Background processing loop.
    #[allow(clippy::too_many_arguments)]
    async fn process_loop(
        handler: Arc<dyn EventHandler>,
        backlog: Arc<RetryBacklog>,
        metrics: Arc<SyncMetrics>,
        mut receiver: mpsc::Receiver<EventEnvelope>,
        sweep_interval: Duration,
        max_attempts: u32,
        cancel: CancellationToken,
    ) {
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut sweep = tokio::time::interval(sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the sweep starts one
        // full interval in.
        sweep.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Event worker process loop cancelled");
                    break;
                }
                received = receiver.recv() => {
                    match received {
                        Some(envelope) => {
                            let handler = Arc::clone(&handler);
                            let backlog = Arc::clone(&backlog);
                            let metrics = Arc::clone(&metrics);
                            tasks.spawn(async move {
                                Self::process_event(handler, backlog, metrics, envelope).await;
                            });
                        }
                        None => {
                            info!("Event channel closed, draining in-flight events");
                            break;
                        }
                    }
                }
                _ = sweep.tick() => {
                    Self::sweep_backlog(&handler, &backlog, &metrics, max_attempts).await;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event task panicked");
                    }
                }
            }
        }

        // In-flight remote calls finish before the loop returns; stop()'s
        // join timeout bounds the wait.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Event task panicked");
            }
        }
    }

    /// Handle one event and record its outcome in the backlog.
    async fn process_event(
        handler: Arc<dyn EventHandler>,
        backlog: Arc<RetryBacklog>,
        metrics: Arc<SyncMetrics>,
        envelope: EventEnvelope,
    ) {
        let event = &envelope.event;
        let report = handler.handle_event(event).await;
        metrics.record_report(&report);

        if report.is_clean() {
            if backlog.resolve(event.person_id()) {
                debug!(
                    person_id = %event.person_id(),
                    "Cleared backlog entry after clean sync"
                );
            }
            return;
        }

        match event.snapshot() {
            Some(assignments) => {
                warn!(
                    event_id = %envelope.event_id,
                    person_id = %event.person_id(),
                    kind = event.kind(),
                    errors = report.errors.len(),
                    "Sync did not converge, queueing snapshot for replay"
                );
                backlog.note_failure(event.person_id(), assignments.to_vec());
            }
            None => {
                warn!(
                    event_id = %envelope.event_id,
                    person_id = %event.person_id(),
                    errors = report.errors.len(),
                    "Deletion sync did not converge"
                );
                // No snapshot survives a deletion; a stored entry would
                // replay stale state, so it is dropped instead.
                backlog.resolve(event.person_id());
            }
        }
    }

    /// Replay every stored snapshot once.
    async fn sweep_backlog(
        handler: &Arc<dyn EventHandler>,
        backlog: &Arc<RetryBacklog>,
        metrics: &Arc<SyncMetrics>,
        max_attempts: u32,
    ) {
        let pending = backlog.pending();
        if pending.is_empty() {
            return;
        }

        info!(count = pending.len(), "Replaying backlog snapshots");

        for (person_id, assignments) in pending {
            let report = handler.resync_memberships(&person_id, &assignments).await;
            metrics.record_replay(&report);

            if report.is_clean() {
                backlog.resolve(&person_id);
                info!(person_id = %person_id, "Backlog replay converged");
            } else if !backlog.note_attempt_failed(&person_id, max_attempts) {
                error!(
                    person_id = %person_id,
                    max_attempts = max_attempts,
                    "Backlog snapshot dropped after repeated replay failures"
                );
            }
        }
    }
}

impl Drop for EventWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("EventWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use stellwerk_domain::RoleKind;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    struct MockHandler {
        event_reports: TokioMutex<Vec<SyncReport>>,
        replay_reports: TokioMutex<Vec<SyncReport>>,
        replayed: TokioMutex<Vec<String>>,
    }

    impl MockHandler {
        fn new() -> Self {
            Self {
                event_reports: TokioMutex::new(Vec::new()),
                replay_reports: TokioMutex::new(Vec::new()),
                replayed: TokioMutex::new(Vec::new()),
            }
        }

        fn with_event_reports(self, reports: Vec<SyncReport>) -> Self {
            Self { event_reports: TokioMutex::new(reports), ..self }
        }

        fn with_replay_reports(self, reports: Vec<SyncReport>) -> Self {
            Self { replay_reports: TokioMutex::new(reports), ..self }
        }

        async fn replayed_persons(&self) -> Vec<String> {
            self.replayed.lock().await.clone()
        }
    }

    #[async_trait]
    impl EventHandler for MockHandler {
        async fn handle_event(&self, event: &PersonEvent) -> SyncReport {
            let mut reports = self.event_reports.lock().await;
            if reports.is_empty() {
                SyncReport::new(event.person_id(), event.kind())
            } else {
                reports.remove(0)
            }
        }

        async fn resync_memberships(
            &self,
            person_id: &str,
            _assignments: &[RoleAssignment],
        ) -> SyncReport {
            self.replayed.lock().await.push(person_id.to_string());
            let mut reports = self.replay_reports.lock().await;
            if reports.is_empty() {
                SyncReport::new(person_id, "resync")
            } else {
                reports.remove(0)
            }
        }
    }

    fn dirty_report(person_id: &str, event_kind: &'static str) -> SyncReport {
        let mut report = SyncReport::new(person_id, event_kind);
        report.record_error("upsert memberships", &"transport failure: timeout");
        report
    }

    fn assignments(person_id: &str) -> Vec<RoleAssignment> {
        vec![RoleAssignment::new(person_id, "org1", "r1", RoleKind::Lern)]
    }

    fn context_added(person_id: &str) -> EventEnvelope {
        let current = assignments(person_id);
        EventEnvelope::new(PersonEvent::ContextAdded {
            person_id: person_id.to_string(),
            added: current[0].clone(),
            current,
        })
    }

    fn person_deleted(person_id: &str) -> EventEnvelope {
        EventEnvelope::new(PersonEvent::PersonDeleted { person_id: person_id.to_string() })
    }

    #[tokio::test]
    async fn clean_event_clears_the_backlog_entry() {
        let handler = Arc::new(MockHandler::new());
        let handler_trait: Arc<dyn EventHandler> = handler.clone();
        let backlog = Arc::new(RetryBacklog::new());
        let metrics = Arc::new(SyncMetrics::new());

        backlog.note_failure("p1", assignments("p1"));

        EventWorker::process_event(
            handler_trait,
            backlog.clone(),
            metrics.clone(),
            context_added("p1"),
        )
        .await;

        assert!(backlog.is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_processed, 1);
        assert_eq!(snapshot.reconciliations_succeeded, 1);
    }

    #[tokio::test]
    async fn failed_event_queues_its_snapshot_for_replay() {
        let handler =
            Arc::new(MockHandler::new().with_event_reports(vec![dirty_report("p1", "context_added")]));
        let handler_trait: Arc<dyn EventHandler> = handler.clone();
        let backlog = Arc::new(RetryBacklog::new());
        let metrics = Arc::new(SyncMetrics::new());

        EventWorker::process_event(
            handler_trait,
            backlog.clone(),
            metrics.clone(),
            context_added("p1"),
        )
        .await;

        let pending = backlog.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, "p1");
        assert_eq!(pending[0].1, assignments("p1"));
        assert_eq!(metrics.snapshot().reconciliations_failed, 1);
    }

    #[tokio::test]
    async fn failed_deletion_drops_the_stored_snapshot() {
        let handler =
            Arc::new(MockHandler::new().with_event_reports(vec![dirty_report("p1", "person_deleted")]));
        let handler_trait: Arc<dyn EventHandler> = handler.clone();
        let backlog = Arc::new(RetryBacklog::new());
        let metrics = Arc::new(SyncMetrics::new());

        backlog.note_failure("p1", assignments("p1"));

        EventWorker::process_event(
            handler_trait,
            backlog.clone(),
            metrics.clone(),
            person_deleted("p1"),
        )
        .await;

        assert!(backlog.is_empty());
    }

    #[tokio::test]
    async fn sweep_resolves_converged_snapshots() {
        let handler = Arc::new(MockHandler::new());
        let handler_trait: Arc<dyn EventHandler> = handler.clone();
        let backlog = Arc::new(RetryBacklog::new());
        let metrics = Arc::new(SyncMetrics::new());

        backlog.note_failure("p1", assignments("p1"));

        EventWorker::sweep_backlog(&handler_trait, &backlog, &metrics, 5).await;

        assert!(backlog.is_empty());
        assert_eq!(handler.replayed_persons().await, vec!["p1".to_string()]);
        assert_eq!(metrics.snapshot().retries_performed, 1);
        assert_eq!(metrics.snapshot().events_processed, 0);
    }

    #[tokio::test]
    async fn sweep_drops_snapshots_after_the_attempt_limit() {
        let handler = Arc::new(MockHandler::new().with_replay_reports(vec![
            dirty_report("p1", "resync"),
            dirty_report("p1", "resync"),
        ]));
        let handler_trait: Arc<dyn EventHandler> = handler.clone();
        let backlog = Arc::new(RetryBacklog::new());
        let metrics = Arc::new(SyncMetrics::new());

        backlog.note_failure("p1", assignments("p1"));

        EventWorker::sweep_backlog(&handler_trait, &backlog, &metrics, 2).await;
        assert_eq!(backlog.attempts("p1"), Some(1));

        EventWorker::sweep_backlog(&handler_trait, &backlog, &metrics, 2).await;
        assert!(backlog.is_empty());
        assert_eq!(metrics.snapshot().retries_performed, 2);
    }

    #[tokio::test]
    async fn start_stop_lifecycle_consumes_the_receiver() {
        let handler: Arc<dyn EventHandler> = Arc::new(MockHandler::new());
        let (_sender, receiver) = mpsc::channel(8);
        let mut worker = EventWorker::new(
            handler,
            Arc::new(RetryBacklog::new()),
            Arc::new(SyncMetrics::new()),
            SyncSettings::default(),
            receiver,
        );

        assert!(!worker.is_running());
        worker.start().await.unwrap();
        assert!(worker.is_running());
        assert_eq!(worker.start().await.unwrap_err(), "Worker already running");

        worker.stop().await.unwrap();
        assert!(!worker.is_running());
        assert_eq!(worker.start().await.unwrap_err(), "Event receiver already consumed");
    }
}
