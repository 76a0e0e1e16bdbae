use super::*;
use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use iris_common::{
    db::MemorySubmissionStore,
    privacy::hash_client_ip,
    storage::MemoryObjectStore,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const BUCKET: &str = "iris-raw";

struct TestApp {
    router: Router,
    objects: MemoryObjectStore,
    submissions: MemorySubmissionStore,
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.bucket = BUCKET.to_string();
    config.storage.table = "iris-submissions".to_string();
    config.privacy.ip_hash_salt = "test-salt".to_string();
    config.rate_limit.enabled = false;
    config
}

fn app_with(config: AppConfig) -> TestApp {
    let objects = MemoryObjectStore::new(BUCKET);
    let submissions = MemorySubmissionStore::new();
    let state = AppState::new(
        Arc::new(config),
        Arc::new(objects.clone()),
        Arc::new(submissions.clone()),
    );

    TestApp {
        router: create_router(state).unwrap(),
        objects,
        submissions,
    }
}

fn app() -> TestApp {
    app_with(test_config())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body_bytes(response).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn consented_submission(participant_id: &str, object_key: &str) -> Value {
    json!({
        "participant_id": participant_id,
        "object_key": object_key,
        "self_reports": ["itchy"],
        "consent": {"over18": true, "data_storage": true}
    })
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, get("/v1/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["time"].as_str().unwrap().starts_with("20"));
}

#[tokio::test]
async fn test_end_to_end_participant_journey() {
    let app = app();

    let (status, body) = send(&app, post_json("/v1/auth/anon", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let pid = body["participant_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post_json(
            "/v1/upload-url",
            json!({"participant_id": pid, "filename": "a.jpg", "contentType": "image/jpeg"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let key = body["object_key"].as_str().unwrap().to_string();
    assert!(key.starts_with(&format!("raw/{}/", pid)));
    assert!(key.ends_with(".jpg"));
    assert_eq!(body["fields"]["key"], key.as_str());
    app.objects.put_object(&key, vec![0xff, 0xd8, 0xff]).await;

    let (status, body) = send(&app, post_json("/v1/submissions", consented_submission(&pid, &key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let pattern = regex_lite::Regex::new(r"^\d{4}-\d{2}-\d{2}T.*#[0-9a-f]{8}$").unwrap();
    assert!(pattern.is_match(body["submission_id"].as_str().unwrap()));

    let (status, body) = send(&app, post_json("/v1/withdraw", json!({"participant_id": pid}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "deleted": 1}));
    assert!(!app.objects.contains(&key).await);
    assert!(app.submissions.is_empty().await);
}

#[tokio::test]
async fn test_upload_url_for_png() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json(
            "/v1/upload-url",
            json!({"participant_id": "abc", "filename": "photo.PNG", "contentType": "image/png"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let pattern = regex_lite::Regex::new(r"^raw/abc/[0-9a-f-]{36}\.png$").unwrap();
    assert!(pattern.is_match(body["object_key"].as_str().unwrap()));
    assert_eq!(body["url"], format!("memory://{}/", BUCKET));
    assert_eq!(body["fields"]["Content-Type"], "image/png");
    assert!(body["fields"]["policy"].is_string());
    assert!(body["fields"]["x-amz-signature"].is_string());
}

#[tokio::test]
async fn test_upload_url_requires_participant() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json(
            "/v1/upload-url",
            json!({"participant_id": "", "filename": "a.jpg", "contentType": "image/jpeg"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "participant_id required");
    assert_eq!(body["error"]["field"], "participant_id");
}

#[tokio::test]
async fn test_upload_url_without_participant_field() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json("/v1/upload-url", json!({"filename": "a.jpg", "contentType": "image/jpeg"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_FIELD");
    assert_eq!(body["error"]["field"], "participant_id");
}

#[tokio::test]
async fn test_upload_url_store_outage() {
    let app = app();
    app.objects.set_unavailable(true);

    let (status, body) = send(
        &app,
        post_json(
            "/v1/upload-url",
            json!({"participant_id": "abc", "filename": "a.jpg", "contentType": "image/jpeg"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "OBJECT_STORE_ERROR");
}

#[tokio::test]
async fn test_submission_without_consent_rejected() {
    let app = app();
    let mut submission = consented_submission("p1", "raw/p1/a.jpg");
    submission["consent"]["data_storage"] = json!(false);

    let (status, body) = send(&app, post_json("/v1/submissions", submission)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONSENT_REQUIRED");
    assert_eq!(
        body["error"]["message"],
        "Explicit consent (over18 + data_storage) is required"
    );
    assert!(app.submissions.is_empty().await);
}

#[tokio::test]
async fn test_submission_missing_consent_is_client_error() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json("/v1/submissions", json!({"participant_id": "p1", "object_key": "raw/p1/a.jpg"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_submission_without_participant_field() {
    let app = app();
    let mut submission = consented_submission("p1", "raw/p1/a.jpg");
    submission.as_object_mut().unwrap().remove("participant_id");

    let (status, body) = send(&app, post_json("/v1/submissions", submission.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_FIELD");
    assert_eq!(body["error"]["field"], "participant_id");

    // consent is checked before identity
    submission["consent"]["over18"] = json!(false);
    let (status, body) = send(&app, post_json("/v1/submissions", submission)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONSENT_REQUIRED");
    assert!(app.submissions.is_empty().await);
}

#[tokio::test]
async fn test_submission_stores_truncated_and_hashed_metadata() {
    let mut config = test_config();
    config.server.trust_forwarded_for = true;
    let app = app_with(config);

    let mut submission = consented_submission("p1", "raw/p1/a.jpg");
    submission["free_text_note"] = json!("n".repeat(700));
    submission["meta"] = json!({"device_type": "phone", "capture_quality_score": 0.9});

    let request = Request::builder()
        .method("POST")
        .uri("/v1/submissions")
        .header("content-type", "application/json")
        .header("user-agent", "a".repeat(250))
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::from(submission.to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let stored = &app.submissions.records_for("p1").await[0];
    assert_eq!(stored.free_text_note.chars().count(), 500);
    assert_eq!(stored.user_agent.chars().count(), 200);
    assert_eq!(stored.meta.device_type.as_deref(), Some("phone"));
    assert_eq!(stored.meta.lighting, None);

    let ip = "203.0.113.9".parse().unwrap();
    assert_eq!(stored.ip_hash.as_deref(), Some(hash_client_ip("test-salt", &ip).as_str()));
}

#[tokio::test]
async fn test_forwarded_for_ignored_by_default() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/submissions")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(consented_submission("p1", "raw/p1/a.jpg").to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.submissions.records_for("p1").await[0].ip_hash, None);
}

#[tokio::test]
async fn test_withdraw_is_idempotent() {
    let app = app();
    for i in 0..3 {
        let key = format!("raw/p1/{}.jpg", i);
        app.objects.put_object(&key, vec![1]).await;
        let (status, _) = send(&app, post_json("/v1/submissions", consented_submission("p1", &key))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, post_json("/v1/withdraw", json!({"participant_id": "p1"}))).await;
    assert_eq!(body["deleted"], 3);

    let (status, body) = send(&app, post_json("/v1/withdraw", json!({"participant_id": "p1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 0);
}

#[tokio::test]
async fn test_withdraw_survives_object_delete_failure() {
    let app = app();
    app.objects.put_object("raw/p1/a.jpg", vec![1]).await;
    app.objects.fail_delete("raw/p1/a.jpg").await;
    send(&app, post_json("/v1/submissions", consented_submission("p1", "raw/p1/a.jpg"))).await;

    let (status, body) = send(&app, post_json("/v1/withdraw", json!({"participant_id": "p1"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
    assert!(app.submissions.is_empty().await);
}

#[tokio::test]
async fn test_withdraw_requires_participant() {
    let app = app();
    let (status, body) = send(&app, post_json("/v1/withdraw", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "participant_id required");
}

#[tokio::test]
async fn test_qr_png() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(get("/v1/qr?url=https%3A%2F%2Fcollect.example.org%2Fstart"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[tokio::test]
async fn test_qr_requires_url() {
    let app = app();
    let (status, body) = send(&app, get("/v1/qr")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "url");
}

#[tokio::test]
async fn test_ready_reports_dependencies() {
    let app = app();
    let (status, body) = send(&app, get("/v1/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["object_store"]["status"], "up");

    app.submissions.set_unavailable(true);
    let (status, body) = send(&app, get("/v1/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["table_store"]["status"], "down");
    assert_eq!(body["checks"]["object_store"]["status"], "up");
}

#[tokio::test]
async fn test_rate_limit_rejects_excess() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = app_with(config);

    let (status, _) = send(&app, post_json("/v1/auth/anon", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post_json("/v1/auth/anon", json!({}))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_health_checks_bypass_rate_limit() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = app_with(config);

    let (status, _) = send(&app, post_json("/v1/auth/anon", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get("/v1/qr?url=https%3A%2F%2Fcollect.example.org")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..3 {
        let (status, _) = send(&app, get("/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, get("/v1/ready")).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = test_config();
    config.server.body_limit_bytes = 128;
    let app = app_with(config);

    let mut submission = consented_submission("p1", "raw/p1/a.jpg");
    submission["free_text_note"] = json!("n".repeat(256));

    let (status, body) = send(&app, post_json("/v1/submissions", submission)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.submissions.is_empty().await);
}

#[tokio::test]
async fn test_request_id_propagated() {
    let app = app();
    let response = app.router.clone().oneshot(get("/v1/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_cors_origin_list() {
    let mut config = test_config();
    config.cors.allowed_origins = "https://collect.example.org".to_string();
    let app = app_with(config);

    let request = Request::builder()
        .uri("/v1/health")
        .header("origin", "https://collect.example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://collect.example.org"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[test]
fn test_invalid_cors_origin_is_config_error() {
    let cors = CorsConfig {
        allowed_origins: "https://ok.example.org, bad\norigin".to_string(),
    };
    assert!(matches!(cors_layer(&cors), Err(AppError::Configuration { .. })));
}
