//! Request deadline errors

use axum::BoxError;
use iris_common::errors::AppError;
use tower::timeout::error::Elapsed;

/// Map a failure from the timeout stack into the API error shape
pub async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        AppError::RequestTimeout
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        error_handling::HandleErrorLayer,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::{timeout::TimeoutLayer, ServiceBuilder, ServiceExt};

    fn deadline_router(deadline: Duration) -> Router {
        Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_timeout_error))
                    .layer(TimeoutLayer::new(deadline)),
            )
    }

    #[tokio::test]
    async fn test_elapsed_deadline_is_api_error() {
        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = deadline_router(Duration::from_millis(10)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()["content-type"], "application/json");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "REQUEST_TIMEOUT");
        assert_eq!(body["error"]["message"], "Request timed out");
    }

    #[tokio::test]
    async fn test_fast_request_passes() {
        let request = Request::builder().uri("/fast").body(Body::empty()).unwrap();
        let response = deadline_router(Duration::from_secs(5)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_other_failures_are_internal() {
        let err = handle_timeout_error("service overloaded".into()).await;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
