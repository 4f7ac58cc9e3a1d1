//! Health check infrastructure for AppContext components
//!
//! Provides HealthStatus and ComponentHealth types for monitoring the wired
//! sync components.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Overall health status of the application
///
/// # Example
/// ```no_run
/// use stellwerk_lib::utils::health::{ComponentHealth, HealthStatus};
///
/// let mut status = HealthStatus::new();
/// status = status.add_component(ComponentHealth::healthy("event_worker"));
/// status = status.add_component(ComponentHealth::unhealthy("backlog", "sweep stalled"));
/// status.calculate_score();
///
/// assert_eq!(status.score, 0.5); // 1 out of 2 components healthy
/// assert!(!status.is_healthy); // Below 0.8 threshold
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall health indicator
    pub is_healthy: bool,

    /// Health score from 0.0 (completely unhealthy) to 1.0 (fully healthy)
    ///
    /// Calculated as: (healthy_components / total_components)
    pub score: f64,

    /// Optional message describing overall health state
    pub message: Option<String>,

    /// Individual component health checks
    pub components: Vec<ComponentHealth>,

    /// Unix timestamp when health check was performed
    pub timestamp: i64,
}

impl HealthStatus {
    /// Create a new health status with default values
    ///
    /// Initial state: healthy with score 1.0, no components
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            score: 1.0,
            message: None,
            components: Vec::new(),
            timestamp: unix_now(),
        }
    }

    /// Add a component health check to the status
    ///
    /// Returns self for method chaining
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Calculate overall health score based on component health
    ///
    /// Score = (healthy_components / total_components)
    /// is_healthy = (score >= 0.8)  // 80% threshold
    ///
    /// Should be called after all components have been added.
    pub fn calculate_score(&mut self) {
        if self.components.is_empty() {
            return;
        }

        let healthy_count = self.components.iter().filter(|c| c.is_healthy).count();

        self.score = healthy_count as f64 / self.components.len() as f64;
        self.is_healthy = self.score >= 0.8; // 80% threshold
    }

    /// Create an unhealthy status with a message
    ///
    /// Convenience constructor for error cases
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            is_healthy: false,
            score: 0.0,
            message: Some(message.into()),
            components: Vec::new(),
            timestamp: unix_now(),
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

/// Health status of an individual component
///
/// # Example
/// ```no_run
/// use stellwerk_lib::utils::health::ComponentHealth;
///
/// let worker = ComponentHealth::healthy("event_worker");
/// assert!(worker.is_healthy);
///
/// let directory = ComponentHealth::unhealthy("directory", "connection refused");
/// assert!(!directory.is_healthy);
/// assert_eq!(directory.message, Some("connection refused".to_string()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g., "event_worker", "backlog")
    pub name: String,

    /// Whether the component is healthy
    pub is_healthy: bool,

    /// Optional message describing health state or error
    pub message: Option<String>,
}

impl ComponentHealth {
    /// Create a healthy component status
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    /// Create an unhealthy component status with a message
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}
