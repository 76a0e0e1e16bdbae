//! Anonymous participant handlers

use axum::Json;
use iris_common::{identity::ParticipantId, metrics};
use serde::Serialize;

#[derive(Serialize)]
pub struct AnonAuthResponse {
    pub participant_id: ParticipantId,
}

/// Issue a fresh anonymous participant identifier
pub async fn issue() -> Json<AnonAuthResponse> {
    let participant_id = ParticipantId::issue();

    metrics::record_participant_issued();
    tracing::info!(participant_id = %participant_id, "Participant issued");

    Json(AnonAuthResponse { participant_id })
}
