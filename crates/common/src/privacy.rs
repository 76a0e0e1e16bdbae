//! Reduction of client metadata before it is stored
//!
//! Raw client addresses are never persisted. Free-text fields are capped by
//! character count.

use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Longest stored free-text note, in characters
pub const MAX_NOTE_CHARS: usize = 500;

/// Longest stored user agent, in characters
pub const MAX_USER_AGENT_CHARS: usize = 200;

/// Salted SHA-256 of a client address, hex encoded
pub fn hash_client_ip(salt: &str, ip: &IpAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update([0u8]);
    hasher.update(ip.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// First `max` characters of `value`
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}
