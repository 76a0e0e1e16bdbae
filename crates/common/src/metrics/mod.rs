//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Iris metrics
pub const METRICS_PREFIX: &str = "iris";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Participant metrics
    describe_counter!(
        format!("{}_participants_issued_total", METRICS_PREFIX),
        Unit::Count,
        "Anonymous participant identifiers issued"
    );

    describe_counter!(
        format!("{}_upload_grants_total", METRICS_PREFIX),
        Unit::Count,
        "Upload grants signed"
    );

    describe_counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Submissions received, by outcome"
    );

    // Erasure metrics
    describe_counter!(
        format!("{}_withdrawals_total", METRICS_PREFIX),
        Unit::Count,
        "Withdrawal requests processed"
    );

    describe_counter!(
        format!("{}_withdrawn_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Submission records erased by withdrawals"
    );

    describe_counter!(
        format!("{}_object_delete_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Object deletions that failed during withdrawal"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_participant_issued() {
    counter!(format!("{}_participants_issued_total", METRICS_PREFIX)).increment(1);
}

pub fn record_upload_grant() {
    counter!(format!("{}_upload_grants_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a submission outcome
pub fn record_submission(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };

    counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record withdrawal metrics
pub fn record_withdrawal(deleted: usize) {
    counter!(format!("{}_withdrawals_total", METRICS_PREFIX)).increment(1);

    counter!(format!("{}_withdrawn_submissions_total", METRICS_PREFIX))
        .increment(deleted as u64);
}

pub fn record_object_delete_failure() {
    counter!(format!("{}_object_delete_failures_total", METRICS_PREFIX)).increment(1);
}
