//! S3-compatible client (MinIO in deployment).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectBody, ObjectInfo, ObjectReader, ObjectStore};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Host and port, without scheme
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub region: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            use_ssl: false,
            region: "us-east-1".to_string(),
        }
    }
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("MINIO_ENDPOINT").unwrap_or(defaults.endpoint),
            access_key_id: std::env::var("MINIO_ACCESS_KEY").unwrap_or(defaults.access_key_id),
            secret_access_key: std::env::var("MINIO_SECRET_KEY")
                .unwrap_or(defaults.secret_access_key),
            use_ssl: std::env::var("MINIO_USE_SSL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.use_ssl),
            region: std::env::var("MINIO_REGION").unwrap_or(defaults.region),
        }
    }

    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            return self.endpoint.clone();
        }
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }
}

/// Object store over the S3 API.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub fn new(config: &S3Config) -> StorageResult<Self> {
        if config.endpoint.is_empty() {
            return Err(StorageError::config_error("MINIO_ENDPOINT is empty"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "minio",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(&S3Config::from_env())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("bucket {} unreachable: {}", bucket, e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        debug!(bucket, key, "Fetching object");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(format!("{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        size: u64,
        content_type: &str,
    ) -> StorageResult<()> {
        let stream = match body {
            ObjectBody::File(path) => ByteStream::from_path(&path)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?,
            ObjectBody::Bytes(data) => ByteStream::from(data),
        };

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .content_length(size as i64)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(bucket, key, size, "Uploaded object");
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(head) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: head.content_length().unwrap_or(0).max(0) as u64,
                content_type: head.content_type().map(str::to_string),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    Ok(None)
                } else {
                    Err(StorageError::AwsSdk(msg))
                }
            }
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!(bucket, key, "Deleting object");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }
}
