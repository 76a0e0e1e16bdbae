use crate::db::models::{format_timestamp, Consent, SubmissionId, SubmissionMeta, SubmissionRecord};
use crate::db::SubmissionStore;
use crate::errors::{AppError, Result};
use crate::identity::ParticipantId;
use crate::metrics;
use crate::privacy::{hash_client_ip, truncate_chars, MAX_NOTE_CHARS, MAX_USER_AGENT_CHARS};
use crate::storage::ObjectKey;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

/// Transport facts about the submitting client
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// A submission as received from the participant
#[derive(Debug, Clone)]
pub struct SubmissionInput {
    pub participant_id: String,
    pub object_key: String,
    pub self_reports: Vec<String>,
    pub free_text_note: Option<String>,
    pub meta: Option<SubmissionMeta>,
    pub consent: Consent,
}

/// Accepts consented submissions into the table store
#[derive(Clone)]
pub struct SubmissionRecorder {
    store: Arc<dyn SubmissionStore>,
    ip_hash_salt: String,
}

impl SubmissionRecorder {
    pub fn new(store: Arc<dyn SubmissionStore>, ip_hash_salt: impl Into<String>) -> Self {
        Self {
            store,
            ip_hash_salt: ip_hash_salt.into(),
        }
    }

    /// Persist one submission and return its id.
    ///
    /// Nothing is written unless both mandatory consent flags are set. The
    /// object key is stored as referenced; it is not looked up in the bucket.
    pub async fn record(&self, input: SubmissionInput, client: &ClientContext) -> Result<SubmissionId> {
        if !input.consent.permits_storage() {
            metrics::record_submission(false);
            return Err(AppError::ConsentRequired);
        }

        let participant_id = ParticipantId::parse(&input.participant_id)?;
        let object_key = ObjectKey::from_client(&input.object_key)?;

        let now = Utc::now();
        let submission_id = SubmissionId::generate(now);
        let record = SubmissionRecord {
            participant_id: participant_id.as_str().to_string(),
            submission_id: submission_id.clone(),
            object_key: object_key.into_string(),
            self_reports: input.self_reports,
            free_text_note: truncate_chars(input.free_text_note.as_deref().unwrap_or(""), MAX_NOTE_CHARS),
            meta: input.meta.unwrap_or_default(),
            consent: input.consent,
            created_at: format_timestamp(now),
            ip_hash: client.ip.as_ref().map(|ip| hash_client_ip(&self.ip_hash_salt, ip)),
            user_agent: truncate_chars(client.user_agent.as_deref().unwrap_or(""), MAX_USER_AGENT_CHARS),
        };

        self.store.put(&record).await?;

        metrics::record_submission(true);
        info!(
            participant_id = %participant_id,
            submission_id = %submission_id,
            object_key = %record.object_key,
            "Submission recorded"
        );

        Ok(submission_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemorySubmissionStore;

    fn consent(over18: bool, data_storage: bool) -> Consent {
        Consent {
            over18,
            data_storage,
            future_research: false,
            recontact_ok: false,
            consent_version: "v1".to_string(),
        }
    }

    fn input(consent: Consent) -> SubmissionInput {
        SubmissionInput {
            participant_id: "p1".to_string(),
            object_key: "raw/p1/a.jpg".to_string(),
            self_reports: vec!["redness".to_string()],
            free_text_note: None,
            meta: None,
            consent,
        }
    }

    fn recorder() -> (SubmissionRecorder, MemorySubmissionStore) {
        let store = MemorySubmissionStore::new();
        (SubmissionRecorder::new(Arc::new(store.clone()), "test-salt"), store)
    }

    #[tokio::test]
    async fn test_consent_gate_persists_nothing() {
        let (recorder, store) = recorder();

        for (over18, data_storage) in [(false, true), (true, false), (false, false)] {
            let err = recorder
                .record(input(consent(over18, data_storage)), &ClientContext::default())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::ConsentRequired));
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_optional_flags_do_not_gate() {
        let (recorder, store) = recorder();
        let mut consent = consent(true, true);
        consent.future_research = true;

        recorder.record(input(consent), &ClientContext::default()).await.unwrap();

        let stored = store.records_for("p1").await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].consent.future_research);
        assert!(!stored[0].consent.recontact_ok);
    }

    #[tokio::test]
    async fn test_note_and_user_agent_truncated() {
        let (recorder, store) = recorder();
        let mut submission = input(consent(true, true));
        submission.free_text_note = Some("n".repeat(600));
        let client = ClientContext {
            ip: None,
            user_agent: Some("u".repeat(300)),
        };

        recorder.record(submission, &client).await.unwrap();

        let stored = &store.records_for("p1").await[0];
        assert_eq!(stored.free_text_note.chars().count(), 500);
        assert_eq!(stored.user_agent.chars().count(), 200);
        assert_eq!(stored.ip_hash, None);
    }

    #[tokio::test]
    async fn test_ip_stored_as_hash_only() {
        let (recorder, store) = recorder();
        let ip: IpAddr = "198.51.100.23".parse().unwrap();
        let client = ClientContext {
            ip: Some(ip),
            user_agent: None,
        };

        recorder.record(input(consent(true, true)), &client).await.unwrap();

        let stored = &store.records_for("p1").await[0];
        assert_eq!(stored.ip_hash.as_deref(), Some(hash_client_ip("test-salt", &ip).as_str()));
        assert_eq!(stored.free_text_note, "");
        assert_eq!(stored.user_agent, "");
    }

    #[tokio::test]
    async fn test_foreign_object_key_is_accepted() {
        let (recorder, store) = recorder();
        let mut submission = input(consent(true, true));
        submission.object_key = "raw/someone-else/b.jpg".to_string();

        recorder.record(submission, &ClientContext::default()).await.unwrap();
        assert_eq!(store.records_for("p1").await[0].object_key, "raw/someone-else/b.jpg");
    }

    #[tokio::test]
    async fn test_required_fields() {
        let (recorder, store) = recorder();

        let mut submission = input(consent(true, true));
        submission.participant_id.clear();
        assert!(recorder.record(submission, &ClientContext::default()).await.is_err());

        let mut submission = input(consent(true, true));
        submission.object_key.clear();
        let err = recorder.record(submission, &ClientContext::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "object_key required");

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_ids() {
        let (recorder, store) = recorder();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .record(input(consent(true, true)), &ClientContext::default())
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.len().await, 20);
    }

    #[tokio::test]
    async fn test_table_failure_propagates() {
        let (recorder, store) = recorder();
        store.set_unavailable(true);

        let err = recorder
            .record(input(consent(true, true)), &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TableStore { .. }));
    }
}
