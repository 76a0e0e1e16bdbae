//! Browser POST upload policies
//!
//! An upload grant is an S3 POST policy signed with SigV4. The bucket checks
//! every condition when the client posts the file, so nothing is stored on
//! our side. `UploadPolicy::check` applies the same conditions locally.

use crate::errors::{AppError, Result};
use crate::identity::ParticipantId;
use crate::storage::keys::{participant_prefix, ObjectKey};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::BTreeMap;
use thiserror::Error;

/// Lifetime of an upload grant
pub const UPLOAD_GRANT_TTL_SECS: i64 = 120;

/// Largest accepted upload (inclusive)
pub const MAX_UPLOAD_BYTES: u64 = 8 * 1024 * 1024;

/// Canned ACL forced on every uploaded object
pub const UPLOAD_ACL: &str = "private";

pub const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";

const SIGNING_SERVICE: &str = "s3";

type HmacSha256 = Hmac<Sha256>;

/// One entry of a POST policy's `conditions` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `{"field": "value"}`
    Equals { field: String, value: String },
    /// `["starts-with", "$field", "prefix"]`
    StartsWith { field: String, prefix: String },
    /// `["content-length-range", min, max]`, both ends inclusive
    ContentLengthRange { min: u64, max: u64 },
}

impl Condition {
    fn equals(field: &str, value: &str) -> Self {
        Condition::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Condition::Equals { field, value } => {
                let mut entry = serde_json::Map::new();
                entry.insert(field.clone(), Value::String(value.clone()));
                Value::Object(entry)
            }
            Condition::StartsWith { field, prefix } => {
                json!(["starts-with", format!("${}", field), prefix])
            }
            Condition::ContentLengthRange { min, max } => {
                json!(["content-length-range", min, max])
            }
        }
    }
}

/// Credentials used to sign a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// What the client needs to post the file directly to the bucket
#[derive(Debug, Clone, Serialize)]
pub struct UploadGrant {
    pub url: String,
    pub fields: BTreeMap<String, String>,
    pub object_key: ObjectKey,
    pub expires_at: DateTime<Utc>,
}

/// Reasons the bucket refuses a posted upload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("policy expired")]
    Expired,

    #[error("missing form field {0}")]
    MissingField(String),

    #[error("field {field} does not match the policy")]
    Mismatch { field: String },

    #[error("field {field} must start with {prefix}")]
    PrefixMismatch { field: String, prefix: String },

    #[error("content length {size} outside {min}..={max}")]
    ContentLength { size: u64, min: u64, max: u64 },

    #[error("no upload grant issued for {0}")]
    NoGrant(String),
}

/// A posted upload as the bucket sees it
#[derive(Debug, Clone)]
pub struct UploadAttempt {
    pub bucket: String,
    pub fields: BTreeMap<String, String>,
    pub content_length: u64,
    pub at: DateTime<Utc>,
}

impl UploadAttempt {
    /// An attempt that posts exactly the granted fields
    pub fn from_grant(grant: &UploadGrant, bucket: &str, content_length: u64, at: DateTime<Utc>) -> Self {
        Self {
            bucket: bucket.to_string(),
            fields: grant.fields.clone(),
            content_length,
            at,
        }
    }

    /// Form fields are matched case-insensitively, as S3 does
    fn field(&self, name: &str) -> Option<&str> {
        if name == "bucket" {
            return Some(self.bucket.as_str());
        }
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Constraints for a single direct upload
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    bucket: String,
    key: ObjectKey,
    content_type: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    conditions: Vec<Condition>,
}

impl UploadPolicy {
    /// Scope an upload of `key` to the participant's prefix.
    ///
    /// `content_type` is pinned exactly as declared by the client.
    pub fn new(
        bucket: &str,
        participant_id: &ParticipantId,
        key: ObjectKey,
        content_type: &str,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let conditions = vec![
            Condition::equals("bucket", bucket),
            Condition::StartsWith {
                field: "key".to_string(),
                prefix: participant_prefix(participant_id),
            },
            Condition::equals("key", key.as_str()),
            Condition::equals("acl", UPLOAD_ACL),
            Condition::ContentLengthRange {
                min: 0,
                max: MAX_UPLOAD_BYTES,
            },
            Condition::equals("Content-Type", content_type),
        ];

        Self {
            bucket: bucket.to_string(),
            key,
            content_type: content_type.to_string(),
            issued_at,
            expires_at: issued_at + Duration::seconds(UPLOAD_GRANT_TTL_SECS),
            conditions,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Sign the policy and assemble the form fields for `url`
    pub fn sign(&self, credentials: &SigningCredentials, region: &str, url: String) -> Result<UploadGrant> {
        let date = self.issued_at.format("%Y%m%d").to_string();
        let amz_date = self.issued_at.format("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!(
            "{}/{}/{}/{}/aws4_request",
            credentials.access_key_id, date, region, SIGNING_SERVICE
        );

        let mut signing_fields = vec![
            ("x-amz-algorithm", SIGNING_ALGORITHM.to_string()),
            ("x-amz-credential", credential),
            ("x-amz-date", amz_date),
        ];
        if let Some(token) = &credentials.session_token {
            signing_fields.push(("x-amz-security-token", token.clone()));
        }

        let mut conditions: Vec<Value> = self.conditions.iter().map(Condition::to_json).collect();
        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), self.key.to_string());
        fields.insert("acl".to_string(), UPLOAD_ACL.to_string());
        fields.insert("Content-Type".to_string(), self.content_type.clone());

        for (name, value) in signing_fields {
            conditions.push(Condition::equals(name, &value).to_json());
            fields.insert(name.to_string(), value);
        }

        let document = json!({
            "expiration": self.expires_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "conditions": conditions,
        });
        let encoded = base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&document)?);

        let key = signing_key(&credentials.secret_access_key, &date, region, SIGNING_SERVICE)?;
        let signature = hex::encode(hmac_sha256(&key, encoded.as_bytes())?);

        fields.insert("policy".to_string(), encoded);
        fields.insert("x-amz-signature".to_string(), signature);

        Ok(UploadGrant {
            url,
            fields,
            object_key: self.key.clone(),
            expires_at: self.expires_at,
        })
    }

    /// Apply the policy conditions to a posted upload
    pub fn check(&self, attempt: &UploadAttempt) -> std::result::Result<(), PolicyViolation> {
        if attempt.at > self.expires_at {
            return Err(PolicyViolation::Expired);
        }

        for condition in &self.conditions {
            match condition {
                Condition::Equals { field, value } => {
                    let actual = attempt
                        .field(field)
                        .ok_or_else(|| PolicyViolation::MissingField(field.clone()))?;
                    if actual != value {
                        return Err(PolicyViolation::Mismatch {
                            field: field.clone(),
                        });
                    }
                }
                Condition::StartsWith { field, prefix } => {
                    let actual = attempt
                        .field(field)
                        .ok_or_else(|| PolicyViolation::MissingField(field.clone()))?;
                    if !actual.starts_with(prefix.as_str()) {
                        return Err(PolicyViolation::PrefixMismatch {
                            field: field.clone(),
                            prefix: prefix.clone(),
                        });
                    }
                }
                Condition::ContentLengthRange { min, max } => {
                    let size = attempt.content_length;
                    if size < *min || size > *max {
                        return Err(PolicyViolation::ContentLength {
                            size,
                            min: *min,
                            max: *max,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| AppError::Internal {
        message: format!("Invalid signing key: {}", e),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 key derivation: secret -> date -> region -> service -> "aws4_request"
fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}
