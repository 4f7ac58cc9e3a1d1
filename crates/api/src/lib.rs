//! # Stellwerk Service
//!
//! Host layer - application context and the standalone entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Component health reporting
//! - The standalone sync binary
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Exposes the event sender as the embedding surface

pub mod context;
pub mod utils;

// Re-export for convenience
pub use context::AppContext;
