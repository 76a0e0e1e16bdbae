//! Object naming for uploaded assets
//!
//! Keys have the form `raw/{participant_id}/{token}.{ext}`. The participant
//! segment is what upload policies scope writes to.

use crate::errors::{AppError, Result};
use crate::identity::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Top-level prefix for unprocessed uploads
pub const RAW_PREFIX: &str = "raw";

/// Extension used when the client filename has none
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Storage key of one uploaded object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build a fresh key for `filename` under the participant's prefix
    pub fn build(participant_id: &ParticipantId, filename: &str) -> Self {
        Self(format!(
            "{}{}.{}",
            participant_prefix(participant_id),
            Uuid::new_v4(),
            extension_of(filename)
        ))
    }

    /// Wrap a key referenced by a client; only emptiness is checked
    pub fn from_client(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(AppError::missing("object_key"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `raw/{participant_id}/`
pub fn participant_prefix(participant_id: &ParticipantId) -> String {
    format!("{}/{}/", RAW_PREFIX, participant_id)
}

/// Lower-cased text after the last `.`, or the default extension
pub fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => DEFAULT_EXTENSION.to_string(),
    }
}

/// Build a key from raw request values
pub fn build_object_key(participant_id: &str, filename: &str) -> Result<ObjectKey> {
    let participant_id = ParticipantId::parse(participant_id)?;
    Ok(ObjectKey::build(&participant_id, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let key = build_object_key("abc", "photo.PNG").unwrap();
        let key = key.as_str();
        assert!(key.starts_with("raw/abc/"));
        assert!(key.ends_with(".png"));

        let token = &key["raw/abc/".len()..key.len() - ".png".len()];
        assert!(Uuid::parse_str(token).is_ok());
    }

    #[test]
    fn test_missing_extension_defaults_to_jpg() {
        for filename in ["", "capture", "IMG_0001"] {
            let key = build_object_key("p1", filename).unwrap();
            assert!(key.as_str().ends_with(".jpg"), "{} -> {}", filename, key);
        }
    }

    #[test]
    fn test_only_last_extension_is_kept() {
        assert_eq!(extension_of("archive.tar.GZ"), "gz");
        assert_eq!(extension_of(".HEIC"), "heic");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_keys_for_same_participant_differ() {
        let pid = ParticipantId::parse("p1").unwrap();
        let a = ObjectKey::build(&pid, "a.jpg");
        let b = ObjectKey::build(&pid, "a.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_participant_rejected() {
        assert!(build_object_key("", "a.jpg").is_err());
        assert!(ObjectKey::from_client("").is_err());
    }
}
