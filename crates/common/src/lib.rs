//! Iris Common Library
//!
//! Shared code for the Iris collection service including:
//! - Participant identifiers and object key scheme
//! - Signed upload policies and the object store
//! - Submission models and the table store
//! - Upload, submission and withdrawal services
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod identity;
pub mod metrics;
pub mod privacy;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::SubmissionStore;
pub use errors::{AppError, Result};
pub use identity::ParticipantId;
pub use storage::ObjectStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
