//! LDAP directory adapter
//!
//! Identities live as `inetOrgPerson` entries under their root-group OU and
//! are looked up by `employeeNumber`. Memberships live as `groupOfNames`
//! entries under a flat `ou=memberships` container. The base tree (root-group
//! OUs and the memberships container) is provisioned out of band.

mod adapter;
mod escape;

pub use adapter::LdapDirectoryAdapter;
pub use escape::{escape_dn_value, escape_filter_value};
