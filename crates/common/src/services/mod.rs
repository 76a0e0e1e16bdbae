//! Core participant-facing operations
//!
//! Each service owns `Arc` handles to the collaborators it needs and holds no
//! other state, so one instance serves every request.

pub mod submissions;
pub mod uploads;
pub mod withdrawal;

pub use submissions::{ClientContext, SubmissionInput, SubmissionRecorder};
pub use uploads::UploadAuthorizer;
pub use withdrawal::{WithdrawalProcessor, WithdrawalSummary};
