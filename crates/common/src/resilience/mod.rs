//! Resilience patterns for fault tolerance
//!
//! Currently this is the retry machinery: a generic executor with bounded
//! attempts, fast-abort on non-retryable failures, and a configurable
//! inter-attempt delay curve. The abstractions are generic over the error
//! type; classification is supplied by the caller through [`retry::RetryPolicy`].

pub mod retry;

// Re-export retry types
pub use retry::{
    policies, retry_with_policy, BackoffStrategy, RetryConfig, RetryDecision, RetryExecutor,
    RetryOutcome, RetryPolicy,
};
