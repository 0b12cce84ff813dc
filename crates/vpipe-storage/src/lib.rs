//! S3-compatible object storage.
//!
//! This crate provides:
//! - The `ObjectStore` contract (get/put/stat/delete by bucket and key)
//! - An S3 client configured for MinIO
//! - An in-memory store for tests
//! - The object key layout shared by the API and the workers

pub mod client;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use keys::{
    original_key, processed_filename, processed_key, thumbnail_key, Buckets, IMAGE_JPEG, VIDEO_MP4,
};
pub use memory::MemoryObjectStore;
pub use store::{download_to_file, upload_file, ObjectBody, ObjectInfo, ObjectReader, ObjectStore};
