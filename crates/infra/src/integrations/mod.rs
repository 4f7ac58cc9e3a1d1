//! External service integrations
//!
//! One module per remote system, each implementing the matching port from
//! `stellwerk-core`. Adapters translate between domain types and the wire
//! protocol of their system; none of them retries internally.

pub mod auth_provider;
pub mod directory;
pub mod groupware;
pub mod learning;
mod xml;

pub use auth_provider::{AuthProviderClient, ConfigRoleCatalog};
pub use directory::LdapDirectoryAdapter;
pub use groupware::GroupwareAdapter;
pub use learning::LearningAdapter;
