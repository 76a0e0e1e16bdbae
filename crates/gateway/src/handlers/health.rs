//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use iris_common::db::models::format_timestamp;
use iris_common::errors::Result;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub time: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub object_store: CheckResult,
    pub table_store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

async fn check(probe: impl Future<Output = Result<()>>) -> CheckResult {
    let start = Instant::now();

    match probe.await {
        Ok(_) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Liveness probe - always returns ok if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: format_timestamp(Utc::now()),
    })
}

/// Readiness probe - checks the bucket and the table
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (object_store, table_store) =
        tokio::join!(check(state.objects.ping()), check(state.submissions.ping()));

    let all_healthy = object_store.is_up() && table_store.is_up();
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks {
                object_store,
                table_store,
            },
        }),
    )
}
