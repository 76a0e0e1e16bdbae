use crate::db::models::{SubmissionRecord, SubmissionRef};
use crate::db::SubmissionStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory `SubmissionStore` for tests and local runs
#[derive(Clone, Default)]
pub struct MemorySubmissionStore {
    records: Arc<Mutex<BTreeMap<(String, String), SubmissionRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Stored records of one participant, oldest first
    pub async fn records_for(&self, participant_id: &str) -> Vec<SubmissionRecord> {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| r.participant_id == participant_id)
            .cloned()
            .collect()
    }

    /// Simulate the table being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::TableStore {
                message: "Table unreachable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn put(&self, record: &SubmissionRecord) -> Result<()> {
        self.ensure_available()?;
        self.records.lock().await.insert(
            (record.participant_id.clone(), record.submission_id.to_string()),
            record.clone(),
        );
        Ok(())
    }

    async fn list_for_participant(&self, participant_id: &str) -> Result<Vec<SubmissionRef>> {
        self.ensure_available()?;
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.participant_id == participant_id)
            .map(|r| SubmissionRef {
                participant_id: r.participant_id.clone(),
                submission_id: r.submission_id.to_string(),
                object_key: Some(r.object_key.clone()).filter(|k| !k.is_empty()),
            })
            .collect())
    }

    async fn delete(&self, participant_id: &str, submission_id: &str) -> Result<()> {
        self.ensure_available()?;
        self.records
            .lock()
            .await
            .remove(&(participant_id.to_string(), submission_id.to_string()));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}
