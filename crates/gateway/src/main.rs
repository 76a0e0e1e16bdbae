//! Iris API Gateway
//!
//! The entry point for participant-facing requests.
//! Handles:
//! - Anonymous participant identifiers
//! - Direct-upload grants
//! - Consented submissions and withdrawal
//! - Rate limiting, CORS and request tracing

mod extract;
mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use iris_common::{
    config::{AppConfig, CorsConfig, ObservabilityConfig},
    db::{DynamoSubmissionStore, SubmissionStore},
    errors::{AppError, Result},
    metrics,
    services::{SubmissionRecorder, UploadAuthorizer, WithdrawalProcessor},
    storage::{load_aws_config, ObjectStore, S3ObjectStore},
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub objects: Arc<dyn ObjectStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub uploads: UploadAuthorizer,
    pub recorder: SubmissionRecorder,
    pub withdrawals: WithdrawalProcessor,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        objects: Arc<dyn ObjectStore>,
        submissions: Arc<dyn SubmissionStore>,
    ) -> Self {
        Self {
            uploads: UploadAuthorizer::new(objects.clone()),
            recorder: SubmissionRecorder::new(submissions.clone(), config.privacy.ip_hash_salt.clone()),
            withdrawals: WithdrawalProcessor::new(objects.clone(), submissions.clone()),
            config,
            objects,
            submissions,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);

    info!("Starting Iris API Gateway v{}", iris_common::VERSION);

    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;
    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    // Storage clients
    let sdk_config = load_aws_config(&config.storage).await;
    let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&sdk_config, &config.storage)?);
    let submissions: Arc<dyn SubmissionStore> =
        Arc::new(DynamoSubmissionStore::new(&sdk_config, &config.storage));

    let state = AppState::new(config.clone(), objects, submissions);

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Result<Router> {
    let config = state.config.clone();

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Probes stay reachable when participants are throttled
    let probe_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    let mut participant_routes = Router::new()
        .route("/auth/anon", post(handlers::participants::issue))
        .route("/upload-url", post(handlers::uploads::upload_url))
        .route("/submissions", post(handlers::submissions::create_submission))
        .route("/withdraw", post(handlers::withdrawals::withdraw))
        .route("/qr", get(handlers::qr::qr));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::new(&config.rate_limit);
        participant_routes = participant_routes.route_layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let api_routes = probe_routes
        .merge(participant_routes)
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests));

    let app = Router::new()
        .nest("/v1", api_routes)
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(middleware::timeout::handle_timeout_error))
                .layer(TimeoutLayer::new(config.request_timeout())),
        );

    Ok(app
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors)?)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state))
}

/// `*` allows any origin without credentials; a list allows exactly those
/// origins with credentials
fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let Some(origins) = config.origins() else {
        return Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods(Any)
            .allow_headers(Any));
    };

    let origins = origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| AppError::Configuration {
                message: format!("Invalid CORS origin {:?}: {}", origin, e),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
