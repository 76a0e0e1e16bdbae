//! Object storage for participant uploads
//!
//! Provides:
//! - Object key scheme (`raw/{participant}/{token}.{ext}`)
//! - Signed POST upload policies
//! - The `ObjectStore` collaborator with S3 and in-memory backends

pub mod keys;
mod memory;
pub mod policy;
mod s3;

pub use keys::{build_object_key, ObjectKey};
pub use memory::MemoryObjectStore;
pub use policy::{PolicyViolation, SigningCredentials, UploadAttempt, UploadGrant, UploadPolicy};
pub use s3::S3ObjectStore;

use crate::config::StorageConfig;
use crate::errors::Result;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_types::SdkConfig;
use tracing::info;

/// Object storage operations used by the service
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket uploads are granted for
    fn bucket(&self) -> &str;

    /// Sign `policy` into a grant the client can post directly
    async fn presign_upload(&self, policy: &UploadPolicy) -> Result<UploadGrant>;

    /// Delete an object; deleting a missing key succeeds
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Check the bucket is reachable
    async fn ping(&self) -> Result<()>;
}

/// Load the AWS configuration shared by the S3 and DynamoDB clients
pub async fn load_aws_config(config: &StorageConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
        let credentials = Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "StaticCredentialsProvider",
        );
        loader = loader.credentials_provider(credentials);
    }

    if let Some(endpoint) = &config.endpoint {
        info!(endpoint = %endpoint, "Using storage endpoint override");
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}
