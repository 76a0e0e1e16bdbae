use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use crate::storage::policy::{SigningCredentials, UploadGrant, UploadPolicy};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use aws_types::SdkConfig;
use tracing::{debug, info};

/// S3 implementation of the ObjectStore trait
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    credentials: SharedCredentialsProvider,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &SdkConfig, config: &StorageConfig) -> Result<Self> {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);

        // Endpoint overrides are addressed path-style
        if config.endpoint.is_some() {
            builder = builder.force_path_style(true);
        }

        let credentials = sdk_config
            .credentials_provider()
            .ok_or_else(|| AppError::Configuration {
                message: "No AWS credentials provider available for signing uploads".to_string(),
            })?;

        info!(bucket = %config.bucket, region = %config.region, "S3 object store ready");

        Ok(Self {
            client: Client::from_conf(builder.build()),
            credentials,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    async fn signing_credentials(&self) -> Result<SigningCredentials> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| AppError::ObjectStore {
                message: format!("Failed to resolve signing credentials: {}", DisplayErrorContext(&e)),
            })?;

        Ok(SigningCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().map(str::to_string),
        })
    }
}

/// POST target for browser uploads
pub(crate) fn upload_url(bucket: &str, region: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com/", bucket, region),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn presign_upload(&self, policy: &UploadPolicy) -> Result<UploadGrant> {
        let credentials = self.signing_credentials().await?;
        let url = upload_url(&self.bucket, &self.region, self.endpoint.as_deref());

        policy.sign(&credentials, &self.region, url)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        debug!("Deleting object from S3: {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::ObjectStore {
                message: format!("Failed to delete object {}: {}", key, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::ObjectStore {
                message: format!("Bucket {} unreachable: {}", self.bucket, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }
}
