//! # Stellwerk Domain
//!
//! Business domain types and models for Stellwerk.
//!
//! This crate contains:
//! - Domain data types (PersonIdentity, RoleAssignment, RemoteMembership, ...)
//! - Domain error types and Result definitions
//! - Configuration structures with serde defaults
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Stellwerk crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
