//! In-memory object store.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectBody, ObjectInfo, ObjectReader, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Object store held in a map keyed by `(bucket, key)`.
///
/// Counts every call so callers can assert that no storage I/O happened.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    operations: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as an operation.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>, content_type: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    data: data.into(),
                    content_type: content_type.to_string(),
                },
            );
        }
    }

    /// Make every subsequent `put` fail.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of contract calls made so far.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Stored bytes and content type, bypassing the operation counter.
    pub fn object(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, String)> {
        let objects = self.objects.lock().ok()?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| (o.data.clone(), o.content_type.clone()))
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let Ok(objects) = self.objects.lock() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn lock(
        &self,
    ) -> StorageResult<std::sync::MutexGuard<'_, HashMap<(String, String), StoredObject>>> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .map_err(|_| StorageError::AwsSdk("object map lock poisoned".to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        let objects = self.lock()?;
        let object = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, key)))?;
        Ok(Box::pin(Cursor::new(object.data.clone())))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        size: u64,
        content_type: &str,
    ) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            self.operations.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::upload_failed(format!(
                "{}/{}: storage rejected upload",
                bucket, key
            )));
        }

        let data = match body {
            ObjectBody::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?,
            ObjectBody::Bytes(data) => data,
        };
        if data.len() as u64 != size {
            return Err(StorageError::upload_failed(format!(
                "{}/{}: declared {} bytes, got {}",
                bucket,
                key,
                size,
                data.len()
            )));
        }

        let mut objects = self.lock()?;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        let objects = self.lock()?;
        Ok(objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| ObjectInfo {
                key: key.to_string(),
                size: o.data.len() as u64,
                content_type: Some(o.content_type.clone()),
            }))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut objects = self.lock()?;
        objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
