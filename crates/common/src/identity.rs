//! Anonymous participant identifiers
//!
//! A participant identifier is a random UUIDv4 in hyphenated form. It is
//! never derived from anything the participant provides and is not checked
//! against storage for uniqueness.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque participant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Issue a fresh identifier
    pub fn issue() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied identifier.
    ///
    /// Any non-empty string is accepted; identifiers are trusted for
    /// partitioning storage, not for secrecy.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(AppError::missing("participant_id"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
