//! Retry wiring for remote adapter calls

use stellwerk_common::resilience::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy,
};
use stellwerk_domain::errors::AdapterError;
use stellwerk_domain::{BackoffKind, RetrySettings};

/// Classifies adapter failures for the retry executor.
///
/// Delegates to the closed failure taxonomy: transport failures retry,
/// everything else stops on first sight.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterRetryPolicy;

impl RetryPolicy<AdapterError> for AdapterRetryPolicy {
    fn classify(&self, error: &AdapterError, _attempt: u32) -> RetryDecision {
        if error.is_retryable() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Translates configured retry settings into the executor's config.
pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    let backoff = match settings.backoff {
        BackoffKind::Fixed => BackoffStrategy::Fixed(settings.delay()),
        BackoffKind::Cubic => BackoffStrategy::Cubic { base: settings.delay() },
    };
    RetryConfig { max_attempts: settings.max_attempts, backoff }
}

/// Builds the executor every adapter call in the engine runs through.
pub fn adapter_executor(settings: &RetrySettings) -> RetryExecutor<AdapterRetryPolicy> {
    RetryExecutor::new(retry_config(settings), AdapterRetryPolicy)
}
