//! Table store models

mod submission;

pub use submission::{
    format_timestamp, Consent, SubmissionId, SubmissionMeta, SubmissionRecord, SubmissionRef,
    TIMESTAMP_FORMAT,
};
