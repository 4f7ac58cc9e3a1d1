//! Learning platform adapter
//!
//! The platform exposes IMS-ES style mass actions over HTTP POST with Basic
//! auth. Every mass response carries one status per submitted sourcedId;
//! the adapter folds those into a `MassResult` without retrying items.

mod adapter;
mod wire;

pub use adapter::LearningAdapter;
pub use wire::{parse_mass_response, parse_memberships_response, ItemResult};
