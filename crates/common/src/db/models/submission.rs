//! Submission records and the consent they are stored under

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `created_at` and the submission id prefix share this layout, e.g.
/// `2026-03-01T09:30:00.123456`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn default_consent_version() -> String {
    "v1".to_string()
}

/// Consent captured with a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    pub over18: bool,
    pub data_storage: bool,
    #[serde(default)]
    pub future_research: bool,
    #[serde(default)]
    pub recontact_ok: bool,
    #[serde(default = "default_consent_version")]
    pub consent_version: String,
}

impl Consent {
    /// Both mandatory flags set
    pub fn permits_storage(&self) -> bool {
        self.over18 && self.data_storage
    }
}

/// Optional capture metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    pub device_type: Option<String>,
    pub lighting: Option<String>,
    pub capture_quality_score: Option<f64>,
}

/// Sort key within a participant partition: `{timestamp}#{8 hex}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix: [u8; 4] = rand::random();
        Self(format!("{}#{}", format_timestamp(at), hex::encode(suffix)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub participant_id: String,
    pub submission_id: SubmissionId,
    pub object_key: String,
    pub self_reports: Vec<String>,
    pub free_text_note: String,
    pub meta: SubmissionMeta,
    pub consent: Consent,
    pub created_at: String,
    pub ip_hash: Option<String>,
    pub user_agent: String,
}

/// Just enough of a stored submission to erase it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRef {
    pub participant_id: String,
    pub submission_id: String,
    pub object_key: Option<String>,
}
