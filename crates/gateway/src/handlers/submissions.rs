//! Submission handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::{ApiJson, ClientMeta};
use crate::AppState;
use iris_common::{
    db::models::{Consent, SubmissionMeta},
    errors::{AppError, Result},
    services::SubmissionInput,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmissionRequest {
    #[serde(default)]
    pub participant_id: String,

    // S3 keys are at most 1024 bytes
    #[validate(length(max = 1024))]
    pub object_key: String,

    #[serde(default)]
    #[validate(length(max = 64))]
    pub self_reports: Vec<String>,

    #[serde(default)]
    pub free_text_note: Option<String>,

    #[serde(default)]
    pub meta: Option<SubmissionMeta>,

    pub consent: Consent,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    pub ok: bool,
    pub submission_id: String,
}

/// Record a consented submission
pub async fn create_submission(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ApiJson(request): ApiJson<SubmissionRequest>,
) -> Result<Json<SubmissionResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let input = SubmissionInput {
        participant_id: request.participant_id,
        object_key: request.object_key,
        self_reports: request.self_reports,
        free_text_note: request.free_text_note,
        meta: request.meta,
        consent: request.consent,
    };

    let submission_id = state.recorder.record(input, &client).await?;

    Ok(Json(SubmissionResponse {
        ok: true,
        submission_id: submission_id.to_string(),
    }))
}
