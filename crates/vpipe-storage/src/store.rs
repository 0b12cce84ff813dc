//! Object storage contract.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Streaming body of a fetched object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Source of bytes for an upload.
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// Stream the file at this path.
    File(PathBuf),
    /// Upload an in-memory buffer.
    Bytes(Vec<u8>),
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    /// Size in bytes
    pub size: u64,
    pub content_type: Option<String>,
}

/// Key/value object storage partitioned into named buckets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object for reading. Fails with `NotFound` if absent.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader>;

    /// Store an object of `size` bytes, replacing any existing one.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        size: u64,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Object metadata, or `None` if it does not exist.
    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectInfo>>;

    /// Remove an object. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;
}

/// Stream an object into a local file, returning the bytes written.
pub async fn download_to_file(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    path: impl AsRef<Path>,
) -> StorageResult<u64> {
    let path = path.as_ref();
    debug!(bucket, key, path = %path.display(), "Downloading object");

    let mut reader = store.get(bucket, key).await?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::download_failed(format!("Failed to create directory: {}", e))
        })?;
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::download_failed(format!("Failed to create file: {}", e)))?;
    let written = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| StorageError::download_failed(format!("{}/{}: {}", bucket, key, e)))?;
    file.flush().await?;

    Ok(written)
}

/// Upload a local file, returning its size.
pub async fn upload_file(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    path: impl AsRef<Path>,
    content_type: &str,
) -> StorageResult<u64> {
    let path = path.as_ref();
    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?
        .len();

    store
        .put(
            bucket,
            key,
            ObjectBody::File(path.to_path_buf()),
            size,
            content_type,
        )
        .await?;

    Ok(size)
}
