//! HTTP client construction
//!
//! One thin wrapper around `reqwest` shared by every HTTP-speaking adapter.
//! Retries are not handled here; callers own retry policy.

pub mod client;

// Re-export commonly used items
pub use client::{HttpClient, HttpClientBuilder};
