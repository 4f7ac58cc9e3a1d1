//! Shared helpers for the service layer

pub mod health;
