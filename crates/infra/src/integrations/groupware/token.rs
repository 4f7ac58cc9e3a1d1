//! Per-call security token for the groupware admin protocol.

use chrono::{SecondsFormat, Utc};
use rand::RngCore;

/// Single-use credentials block sent in every call's authentication header.
/// The platform rejects replayed nonces, so tokens must never be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    pub timestamp: String,
    pub nonce: String,
}

impl SecurityToken {
    /// Fresh token: current UTC instant (ISO-8601) plus a 16-byte random
    /// nonce in hex.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            nonce: hex::encode(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    #[test]
    fn tokens_are_single_use() {
        let a = SecurityToken::generate();
        let b = SecurityToken::generate();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn nonce_is_sixteen_bytes_of_hex() {
        let token = SecurityToken::generate();
        assert_eq!(token.nonce.len(), 32);
        assert!(token.nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn timestamp_is_iso8601() {
        let token = SecurityToken::generate();
        assert!(DateTime::parse_from_rfc3339(&token.timestamp).is_ok());
    }
}
