use crate::errors::{AppError, Result};
use crate::storage::policy::{PolicyViolation, SigningCredentials, UploadAttempt, UploadGrant, UploadPolicy};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

const MEMORY_REGION: &str = "local";

/// `MemoryObjectStore` is an in-memory implementation of the `ObjectStore` trait.
///
/// It signs grants with fixed credentials, enforces them on `upload` the way
/// the bucket would, and can simulate delete failures and outages.
#[derive(Clone)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    // Issued policies, keyed by their encoded `policy` form field
    grants: Arc<Mutex<HashMap<String, UploadPolicy>>>,
    fail_deletes: Arc<Mutex<HashSet<String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            grants: Arc::new(Mutex::new(HashMap::new())),
            fail_deletes: Arc::new(Mutex::new(HashSet::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Accept a direct upload if it satisfies the policy it was granted under
    pub async fn upload(&self, attempt: &UploadAttempt, data: Vec<u8>) -> std::result::Result<(), PolicyViolation> {
        let encoded = attempt
            .fields
            .get("policy")
            .ok_or_else(|| PolicyViolation::MissingField("policy".to_string()))?;

        let key = {
            let grants = self.grants.lock().await;
            let policy = grants
                .get(encoded)
                .ok_or_else(|| PolicyViolation::NoGrant(encoded.clone()))?;
            policy.check(attempt)?;
            policy.key().to_string()
        };

        self.objects.lock().await.insert(key, data);
        Ok(())
    }

    /// Store an object directly, bypassing grants
    pub async fn put_object(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().await.insert(key.to_string(), data);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    /// Grants still held for upload checks
    pub async fn grant_count(&self) -> usize {
        self.grants.lock().await.len()
    }

    /// Make every delete of `key` fail
    pub async fn fail_delete(&self, key: &str) {
        self.fail_deletes.lock().await.insert(key.to_string());
    }

    /// Simulate the bucket being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::ObjectStore {
                message: format!("Bucket {} unreachable", self.bucket),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn presign_upload(&self, policy: &UploadPolicy) -> Result<UploadGrant> {
        self.ensure_available()?;

        let credentials = SigningCredentials {
            access_key_id: "MEMORYACCESSKEY".to_string(),
            secret_access_key: "memory-secret-key".to_string(),
            session_token: None,
        };
        let grant = policy.sign(&credentials, MEMORY_REGION, format!("memory://{}/", self.bucket))?;

        if let Some(encoded) = grant.fields.get("policy") {
            let now = Utc::now();
            let mut grants = self.grants.lock().await;
            grants.retain(|_, issued| issued.expires_at() >= now);
            grants.insert(encoded.clone(), policy.clone());
        }

        Ok(grant)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.ensure_available()?;

        if self.fail_deletes.lock().await.contains(key) {
            return Err(AppError::ObjectStore {
                message: format!("Failed to delete object {}", key),
            });
        }

        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}
