//! # Stellwerk Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Configuration loading (environment, TOML file, defaults)
//! - HTTP client construction and error conversions
//! - External system adapters (directory, groupware, learning platform,
//!   auth provider)
//! - The sync worker, retry backlog, and sync metrics
//!
//! ## Architecture
//! - Implements traits defined in `stellwerk-core`
//! - Depends on `stellwerk-domain` and `stellwerk-core`
//! - Contains all "impure" code (I/O, remote protocols)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;
pub mod registry;
pub mod sync;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use http::*;
pub use integrations::*;
pub use observability::*;
pub use registry::*;
pub use sync::*;
