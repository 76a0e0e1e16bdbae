//! Table store for submission records
//!
//! Provides:
//! - Submission and consent models
//! - The `SubmissionStore` collaborator
//! - DynamoDB and in-memory backends

mod dynamo;
mod memory;
pub mod models;

pub use dynamo::DynamoSubmissionStore;
pub use memory::MemorySubmissionStore;

use crate::errors::Result;
use async_trait::async_trait;
use models::{SubmissionRecord, SubmissionRef};

/// Submission persistence keyed by `(participant_id, submission_id)`
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a new record
    async fn put(&self, record: &SubmissionRecord) -> Result<()>;

    /// Every record in the participant's partition
    async fn list_for_participant(&self, participant_id: &str) -> Result<Vec<SubmissionRef>>;

    /// Delete one record by its full key
    async fn delete(&self, participant_id: &str, submission_id: &str) -> Result<()>;

    /// Check the table is reachable
    async fn ping(&self) -> Result<()>;
}
