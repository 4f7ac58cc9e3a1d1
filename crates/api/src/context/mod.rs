//! Application context - dependency injection container

use std::sync::Arc;

use stellwerk_core::provisioning::ports::{
    DirectoryAdapter, IdentityRegistry, RoleCatalog, RoleGrantPort,
};
use stellwerk_core::{MembershipReconciler, ProvisioningService, RoleGrantDiffer};
use stellwerk_domain::{Config, DomainError, EventEnvelope, Result};
use stellwerk_infra::integrations::{
    AuthProviderClient, ConfigRoleCatalog, GroupwareAdapter, LdapDirectoryAdapter, LearningAdapter,
};
use stellwerk_infra::observability::SyncMetrics;
use stellwerk_infra::registry::InMemoryIdentityRegistry;
use stellwerk_infra::sync::{EventHandler, EventWorker, RetryBacklog};
use tokio::sync::mpsc;

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
///
/// Owns the running event worker. The embedding application feeds domain
/// events through [`AppContext::events`]; everything downstream of the
/// channel is wired here.
pub struct AppContext {
    /// Configuration the context was built from.
    pub config: Config,

    /// Shared sync counters.
    pub metrics: Arc<SyncMetrics>,

    /// Snapshots awaiting replay by the backlog sweep.
    pub backlog: Arc<RetryBacklog>,

    /// Sending half of the event queue. Clone one per producer.
    pub events: mpsc::Sender<EventEnvelope>,

    worker: EventWorker,
}

/// Wire the provisioning service: adapters behind their ports, the
/// reconciler bound to the membership authority, one identity system per
/// remote that stores person records.
fn create_provisioning_service(config: &Config) -> Result<ProvisioningService> {
    let catalog: Arc<dyn RoleCatalog> =
        Arc::new(ConfigRoleCatalog::new(config.auth_provider.role_mappings.clone()));
    let grants: Arc<dyn RoleGrantPort> =
        Arc::new(AuthProviderClient::new(config.auth_provider.clone()).map_err(|err| {
            tracing::error!(error = %err, "failed to construct AuthProviderClient");
            DomainError::Internal(format!("failed to construct AuthProviderClient: {err}"))
        })?);
    let registry: Arc<dyn IdentityRegistry> = Arc::new(InMemoryIdentityRegistry::new());

    let directory: Arc<dyn DirectoryAdapter> =
        Arc::new(LdapDirectoryAdapter::new(config.directory.clone()));
    let groupware: Arc<dyn DirectoryAdapter> =
        Arc::new(GroupwareAdapter::new(config.groupware.clone()).map_err(|err| {
            tracing::error!(error = %err, "failed to construct GroupwareAdapter");
            DomainError::Internal(format!("failed to construct GroupwareAdapter: {err}"))
        })?);
    let learning: Arc<dyn DirectoryAdapter> =
        Arc::new(LearningAdapter::new(config.learning.clone()).map_err(|err| {
            tracing::error!(error = %err, "failed to construct LearningAdapter");
            DomainError::Internal(format!("failed to construct LearningAdapter: {err}"))
        })?);

    // Memberships reconcile against the learning platform: its mass actions
    // are keyed by (person, organisation) and re-sending an entry is an
    // upsert there, which the reconciliation plan relies on.
    let reconciler = MembershipReconciler::new(
        Arc::clone(&learning),
        config.reconcile.clone(),
        config.learning.retry.clone(),
    );
    let differ = RoleGrantDiffer::new(catalog);

    Ok(ProvisioningService::new(
        reconciler,
        differ,
        grants,
        registry,
        config.auth_provider.retry.clone(),
    )
    .with_identity_system(directory, config.directory.retry.clone())
    .with_identity_system(groupware, config.groupware.retry.clone())
    .with_identity_system(learning, config.learning.retry.clone()))
}

/// Build and start the event worker (fail-fast initialization).
async fn create_event_worker(
    handler: Arc<dyn EventHandler>,
    backlog: Arc<RetryBacklog>,
    metrics: Arc<SyncMetrics>,
    config: &Config,
    receiver: mpsc::Receiver<EventEnvelope>,
) -> Result<EventWorker> {
    let mut worker = EventWorker::new(handler, backlog, metrics, config.sync.clone(), receiver);

    worker.start().await.map_err(|err| {
        tracing::error!(error = %err, "failed to start EventWorker");
        DomainError::Internal(format!("failed to start EventWorker: {err}"))
    })?;

    Ok(worker)
}

impl AppContext {
    /// Create a new application context with default configuration
    pub async fn new() -> Result<Self> {
        Self::with_config(Config::default()).await
    }

    /// Create a new application context from a loaded configuration
    ///
    /// Validates the configuration, wires all adapters behind their ports
    /// and starts the event worker. Any failure aborts construction.
    pub async fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(SyncMetrics::new());
        let backlog = Arc::new(RetryBacklog::new());

        let service = create_provisioning_service(&config)?;
        let handler: Arc<dyn EventHandler> = Arc::new(service);

        let (events, receiver) = mpsc::channel(config.sync.event_queue_capacity);

        let worker = create_event_worker(
            handler,
            Arc::clone(&backlog),
            Arc::clone(&metrics),
            &config,
            receiver,
        )
        .await?;

        Ok(Self { config, metrics, backlog, events, worker })
    }

    /// Stop the event worker, waiting for in-flight syncs up to the join
    /// timeout. The event queue closes once the worker task has drained.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.worker.stop().await.map_err(|err| {
            tracing::error!(error = %err, "failed to stop EventWorker");
            DomainError::Internal(format!("failed to stop EventWorker: {err}"))
        })
    }

    /// Check health of all application components
    ///
    /// Returns a HealthStatus with individual component health checks and an
    /// overall health score. The score is calculated as (healthy_components
    /// / total_components), and the application is considered healthy if
    /// score >= 0.8.
    pub fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        // The worker is the only component with an observable running state
        status = status.add_component(if self.worker.is_running() {
            ComponentHealth::healthy("event_worker")
        } else {
            ComponentHealth::unhealthy("event_worker", "worker not running")
        });

        // A non-empty backlog is the recovery path working, not a failure
        status = status.add_component(ComponentHealth::healthy("backlog"));

        // Note: Adapters hold no connection state between calls, assumed
        // healthy once constructed
        status = status.add_component(ComponentHealth::healthy("directory"));
        status = status.add_component(ComponentHealth::healthy("groupware"));
        status = status.add_component(ComponentHealth::healthy("learning"));
        status = status.add_component(ComponentHealth::healthy("auth_provider"));

        status.calculate_score();
        status
    }
}
