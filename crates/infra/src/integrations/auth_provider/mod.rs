//! Auth provider adapter
//!
//! REST client for realm-role grant/revoke plus a config-backed role
//! catalog. Admin calls authenticate with a client-credentials access token
//! that is cached until shortly before expiry.

mod catalog;
mod client;

pub use catalog::ConfigRoleCatalog;
pub use client::AuthProviderClient;
