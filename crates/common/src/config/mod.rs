//! Configuration management for Iris services
//!
//! Supports loading configuration from:
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Environment variables (prefixed with APP__)
//! - The flat deployment variables AWS_REGION, S3_BUCKET, DDB_TABLE, ALLOWED_ORIGINS
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Object store and table store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cross-origin access
    #[serde(default)]
    pub cors: CorsConfig,

    /// Privacy settings for stored client metadata
    #[serde(default)]
    pub privacy: PrivacyConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Take the client address from the first X-Forwarded-For entry
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// AWS region for both S3 and DynamoDB
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket receiving direct uploads
    #[serde(default)]
    pub bucket: String,

    /// DynamoDB table holding submission records
    #[serde(default)]
    pub table: String,

    /// Endpoint override for local S3/DynamoDB stacks
    pub endpoint: Option<String>,

    /// Static credentials (falls back to the default provider chain)
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// `*` or a comma-separated list of origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrivacyConfig {
    /// Salt mixed into client IP hashes
    #[serde(default)]
    pub ip_hash_salt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_body_limit() -> usize { 64 * 1024 }
fn default_region() -> String { "ap-southeast-2".to_string() }
fn default_allowed_origins() -> String { "*".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
            trust_forwarded_for: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            bucket: String::new(),
            table: String::new(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl CorsConfig {
    /// Explicit origin list, or `None` when any origin is allowed
    pub fn origins(&self) -> Option<Vec<String>> {
        let raw = self.allowed_origins.trim();
        if raw.is_empty() || raw == "*" {
            return None;
        }

        Some(
            raw.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // e.g., APP__STORAGE__BUCKET=iris-raw
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )

            // Flat deployment variables win over everything else
            .set_override_option("storage.region", std::env::var("AWS_REGION").ok())?
            .set_override_option("storage.bucket", std::env::var("S3_BUCKET").ok())?
            .set_override_option("storage.table", std::env::var("DDB_TABLE").ok())?
            .set_override_option("cors.allowed_origins", std::env::var("ALLOWED_ORIGINS").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("storage.region (AWS_REGION)", &self.storage.region),
            ("storage.bucket (S3_BUCKET)", &self.storage.bucket),
            ("storage.table (DDB_TABLE)", &self.storage.table),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Configuration {
                    message: format!("Missing required setting: {}", name),
                });
            }
        }

        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(AppError::Configuration {
                message: "storage.access_key_id and storage.secret_access_key must be set together"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
