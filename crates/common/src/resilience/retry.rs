//! Generic retry execution with bounded attempts and fast abort
//!
//! This module provides the retry mechanism used around every remote call in
//! the sync engine. An operation is invoked up to a bounded number of times;
//! failures are classified by a [`RetryPolicy`] before anything else, so a
//! non-retryable failure aborts immediately without consuming the remaining
//! attempts. When the budget is exhausted the caller receives the last
//! observed error value itself, never a synthetic wrapper.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};

/// Decision for whether to retry a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation after the configured backoff delay
    Retry,
    /// Don't retry the operation
    Stop,
}

/// Trait for classifying whether an error should be retried
pub trait RetryPolicy<E> {
    /// Classify the error observed on the given 0-based attempt.
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Backoff strategy for calculating inter-attempt delays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// One constant delay between all retries
    Fixed(Duration),
    /// Growing delay: `base * n^3` before the retry following the n-th
    /// failed attempt (1-based)
    Cubic { base: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay after the given 0-based failed attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Cubic { base } => {
                let factor = attempt.saturating_add(1).saturating_pow(3);
                base.saturating_mul(factor)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of invocations, including the first. At least one
    /// invocation is always made, even for a configured value of 0.
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: BackoffStrategy::Fixed(Duration::from_millis(15_000)) }
    }
}

impl RetryConfig {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, backoff: BackoffStrategy::Fixed(delay) }
    }

    pub fn cubic(max_attempts: u32, base: Duration) -> Self {
        Self { max_attempts, backoff: BackoffStrategy::Cubic { base } }
    }
}

/// Outcome of a retry execution including summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Number of invocations actually made
    pub attempts: u32,
    /// Sum of all backoff delays slept through
    pub total_delay: Duration,
    /// True when the run ended because the policy classified the failure as
    /// non-retryable, false on success or attempt exhaustion
    pub aborted: bool,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// The main retry executor
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation, returning the success value or the last observed
    /// error once the run ends.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation and return the outcome with summary statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;
        let mut total_delay = Duration::ZERO;

        loop {
            let attempt_number = attempt + 1;
            debug!("Executing operation (attempt {}/{})", attempt_number, max_attempts);

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt_number,
                        total_delay,
                        aborted: false,
                    };
                }
                Err(error) => match self.policy.classify(&error, attempt) {
                    RetryDecision::Stop => {
                        debug!(error = %error, "Failure is non-retryable, aborting");
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt_number,
                            total_delay,
                            aborted: true,
                        };
                    }
                    RetryDecision::Retry => {
                        if attempt_number >= max_attempts {
                            warn!(
                                error = %error,
                                "All retry attempts exhausted after {} tries",
                                attempt_number
                            );
                            return RetryOutcome {
                                result: Err(error),
                                attempts: attempt_number,
                                total_delay,
                                aborted: false,
                            };
                        }

                        let delay = self.config.backoff.calculate_delay(attempt);
                        warn!(
                            error = %error,
                            "Operation failed (attempt {}), retrying after {:?}",
                            attempt_number,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        total_delay += delay;
                        attempt += 1;
                    }
                },
            }
        }
    }
}

/// Convenience function to create a retry executor and execute an operation
pub async fn retry_with_policy<F, Fut, T, E, P>(
    config: RetryConfig,
    policy: P,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Display,
{
    let executor = RetryExecutor::new(config, policy);
    executor.execute(operation).await
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn classify(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn classify(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn classify(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::policies::{AlwaysRetry, NeverRetry, PredicateRetry};
    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::fixed(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn fixed_backoff_returns_constant_delay() {
        let strategy = BackoffStrategy::Fixed(Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(5), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(100), Duration::from_millis(100));
    }

    #[test]
    fn cubic_backoff_grows_with_the_cube_of_the_attempt() {
        let strategy = BackoffStrategy::Cubic { base: Duration::from_millis(10) };
        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(10));
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(80));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(270));
    }

    #[test]
    fn default_config_is_three_attempts_with_fifteen_second_delay() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff, BackoffStrategy::Fixed(Duration::from_millis(15_000)));
    }

    #[tokio::test]
    async fn first_attempt_success_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);

        let calls_clone = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.total_delay, Duration::ZERO);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);

        let calls_clone = Arc::clone(&calls);
        let result: Result<u32, String> = executor
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("boom-{n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_observed_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);

        let calls_clone = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err::<u32, String>(format!("boom-{n}"))
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap_err(), "boom-3");
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_aborts_after_one_invocation() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast_config(3), NeverRetry);

        let calls_clone = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, String>("invalid payload".to_owned())
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap_err(), "invalid payload");
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn policy_is_consulted_with_the_attempt_index() {
        let calls = Arc::new(AtomicU32::new(0));
        // Stop as soon as the second failure (attempt index 1) is observed.
        let policy = PredicateRetry::new(|_: &String, attempt| attempt < 1);
        let executor = RetryExecutor::new(fast_config(5), policy);

        let calls_clone = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, String>("still failing".to_owned())
                }
            })
            .await;

        assert!(outcome.aborted);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_invokes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast_config(0), AlwaysRetry);

        let calls_clone = Arc::clone(&calls);
        let result: Result<u32, String> = executor
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_owned())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outcome_accumulates_the_configured_delays() {
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);

        let outcome = executor
            .execute_with_outcome(|| async { Err::<u32, String>("boom".to_owned()) })
            .await;

        // Two sleeps of 1 ms each between three attempts.
        assert_eq!(outcome.total_delay, Duration::from_millis(2));
    }

    #[tokio::test]
    async fn convenience_function_flattens_to_a_plain_result() {
        let result: Result<u32, String> =
            retry_with_policy(fast_config(2), AlwaysRetry, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
