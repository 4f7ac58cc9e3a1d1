//! Shared utilities for Stellwerk crates.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards to ensure
//! reliability across all Stellwerk components.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use resilience::retry::{
    retry_with_policy, BackoffStrategy, RetryConfig, RetryDecision, RetryExecutor, RetryOutcome,
    RetryPolicy,
};
