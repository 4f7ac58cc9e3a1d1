//! Error conversions at the infrastructure boundary
//!
//! External library errors (reqwest, ldap3, quick-xml) are mapped into the
//! adapter failure taxonomy here, in one place, so adapters never classify
//! transport errors ad hoc.

pub mod conversions;

// Re-export commonly used items
pub use conversions::{ldap_rc_error, InfraError};
