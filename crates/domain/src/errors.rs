//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Stellwerk
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unmapped domain: {0}")]
    UnmappedDomain(String),

    #[error("Remote system error: {0}")]
    Remote(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Stellwerk operations
pub type Result<T> = std::result::Result<T, DomainError>;

/// Result type alias for outbound remote calls
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Failure taxonomy for outbound remote calls.
///
/// Adapters tag every failure with exactly one of these variants at the
/// transport boundary; callers classify by matching on the tag, never by
/// probing error shapes. `PartialBatch` is constructed by the reconciler from
/// a [`crate::types::membership::MassResult`] with failed items, not by
/// adapters themselves.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum AdapterError {
    /// Network, HTTP, or directory-session failure. The only retryable kind.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote system rejected the payload shape or content.
    #[error("remote validation rejected request: {0}")]
    RemoteValidation(String),

    /// A referenced remote or local entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A mass call completed but one or more items failed.
    #[error("batch completed with {failed} of {total} item(s) failed")]
    PartialBatch { failed: usize, total: usize },
}

impl AdapterError {
    /// Whether a retry with the same input can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Short tag for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::RemoteValidation(_) => "remote_validation",
            Self::NotFound(_) => "not_found",
            Self::PartialBatch { .. } => "partial_batch",
        }
    }
}

impl From<AdapterError> for DomainError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Remote(other.to_string()),
        }
    }
}
