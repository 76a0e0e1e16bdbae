use crate::errors::Result;
use crate::identity::ParticipantId;
use crate::metrics;
use crate::storage::{ObjectKey, ObjectStore, UploadGrant, UploadPolicy};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Issues direct-upload grants scoped to one participant
#[derive(Clone)]
pub struct UploadAuthorizer {
    objects: Arc<dyn ObjectStore>,
}

impl UploadAuthorizer {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Grant a single upload of `filename` under the participant's prefix.
    ///
    /// `content_type` is pinned into the grant as given. Nothing is persisted;
    /// an unused grant simply expires.
    pub async fn authorize(
        &self,
        participant_id: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadGrant> {
        let participant_id = ParticipantId::parse(participant_id)?;
        let key = ObjectKey::build(&participant_id, filename);
        let policy = UploadPolicy::new(
            self.objects.bucket(),
            &participant_id,
            key,
            content_type,
            Utc::now(),
        );

        let grant = self.objects.presign_upload(&policy).await?;

        metrics::record_upload_grant();
        debug!(
            participant_id = %participant_id,
            object_key = %grant.object_key,
            expires_at = %grant.expires_at,
            "Upload grant issued"
        );

        Ok(grant)
    }
}
