use crate::db::SubmissionStore;
use crate::errors::Result;
use crate::identity::ParticipantId;
use crate::metrics;
use crate::storage::ObjectStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a withdrawal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WithdrawalSummary {
    /// Submission records erased
    pub deleted: usize,
    /// Objects whose deletion failed and were left behind
    pub object_failures: usize,
}

/// Erases everything stored for a participant
#[derive(Clone)]
pub struct WithdrawalProcessor {
    objects: Arc<dyn ObjectStore>,
    submissions: Arc<dyn SubmissionStore>,
}

impl WithdrawalProcessor {
    pub fn new(objects: Arc<dyn ObjectStore>, submissions: Arc<dyn SubmissionStore>) -> Self {
        Self { objects, submissions }
    }

    /// Delete every submission of `participant_id` and its object.
    ///
    /// Object deletion is best effort: a failure is logged and the record is
    /// still deleted. Record deletion failures abort the withdrawal.
    pub async fn withdraw(&self, participant_id: &str) -> Result<WithdrawalSummary> {
        let participant_id = ParticipantId::parse(participant_id)?;
        let refs = self.submissions.list_for_participant(participant_id.as_str()).await?;

        let mut summary = WithdrawalSummary::default();
        for submission in refs {
            if let Some(key) = &submission.object_key {
                if let Err(e) = self.objects.delete_object(key).await {
                    summary.object_failures += 1;
                    metrics::record_object_delete_failure();
                    warn!(
                        participant_id = %participant_id,
                        submission_id = %submission.submission_id,
                        object_key = %key,
                        error = %e,
                        "Object deletion failed during withdrawal"
                    );
                }
            }

            self.submissions
                .delete(&submission.participant_id, &submission.submission_id)
                .await?;
            summary.deleted += 1;
        }

        metrics::record_withdrawal(summary.deleted);
        info!(
            participant_id = %participant_id,
            deleted = summary.deleted,
            object_failures = summary.object_failures,
            "Withdrawal processed"
        );

        Ok(summary)
    }
}
