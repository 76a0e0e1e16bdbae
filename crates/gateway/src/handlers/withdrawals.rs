//! Withdrawal handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::extract::ApiJson;
use crate::AppState;
use iris_common::errors::Result;

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    #[serde(default)]
    pub participant_id: String,
}

#[derive(Serialize)]
pub struct WithdrawResponse {
    pub ok: bool,
    pub deleted: usize,
}

/// Erase every submission of a participant
pub async fn withdraw(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>> {
    let summary = state.withdrawals.withdraw(&request.participant_id).await?;

    Ok(Json(WithdrawResponse {
        ok: true,
        deleted: summary.deleted,
    }))
}
