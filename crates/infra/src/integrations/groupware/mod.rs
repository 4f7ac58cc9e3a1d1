//! Groupware platform adapter
//!
//! The platform speaks an XML action protocol over HTTP POST. Every call
//! carries a fresh security token (timestamp plus single-use nonce) in the
//! authentication header. Group membership is modelled on the remote side as
//! membership in a named group `<groupId>#<role>`, so a role change moves the
//! user between sibling groups.

mod adapter;
mod soap;
mod token;

pub use adapter::GroupwareAdapter;
pub use soap::{parse_response, ActionCall, ActionResponse, RemoteGroup, RemoteStatus};
pub use token::SecurityToken;
