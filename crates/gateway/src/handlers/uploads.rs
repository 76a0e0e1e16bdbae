//! Upload grant handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::extract::ApiJson;
use crate::AppState;
use iris_common::errors::{AppError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct UploadUrlRequest {
    #[validate(length(max = 255))]
    pub filename: String,

    #[validate(length(max = 255))]
    #[serde(rename = "contentType")]
    pub content_type: String,

    #[serde(default)]
    pub participant_id: String,
}

#[derive(Serialize)]
pub struct UploadUrlResponse {
    pub url: String,
    pub fields: BTreeMap<String, String>,
    pub object_key: String,
}

/// Grant a direct upload to the object store
pub async fn upload_url(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let grant = state
        .uploads
        .authorize(&request.participant_id, &request.filename, &request.content_type)
        .await?;

    Ok(Json(UploadUrlResponse {
        url: grant.url,
        fields: grant.fields,
        object_key: grant.object_key.into_string(),
    }))
}
