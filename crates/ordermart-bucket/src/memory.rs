use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BucketConnector, BucketError, BucketStore};

/// Process-local bucket used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBucketStore {
    bucket: String,
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
    reject_uploads: bool,
}

impl MemoryBucketStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Every `put_object` fails with an SDK error; reads keep working.
    pub fn rejecting_uploads(mut self) -> Self {
        self.reject_uploads = true;
        self
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.lock().insert(key.into(), bytes.into());
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Bytes>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        Ok(self.lock().contains_key(key))
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        self.object(key)
            .ok_or_else(|| BucketError::NotFound(key.to_string()))
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), BucketError> {
        if self.reject_uploads {
            return Err(BucketError::Sdk(format!(
                "upload of {key} to {} rejected",
                self.bucket
            )));
        }
        self.insert(key, bytes);
        Ok(())
    }
}

/// Resolves bucket names to shared [`MemoryBucketStore`]s, creating empty ones on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    buckets: Arc<Mutex<HashMap<String, MemoryBucketStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, store: MemoryBucketStore) -> Self {
        self.lock().insert(store.bucket.clone(), store);
        self
    }

    pub fn bucket(&self, name: &str) -> MemoryBucketStore {
        self.lock()
            .entry(name.to_string())
            .or_insert_with(|| MemoryBucketStore::new(name))
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryBucketStore>> {
        match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl BucketConnector for MemoryConnector {
    fn open(&self, bucket: &str) -> Result<Arc<dyn BucketStore>, BucketError> {
        if bucket.is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }
        Ok(Arc::new(self.bucket(bucket)))
    }
}
