//! Firestore REST API client.
//!
//! This crate provides:
//! - A thin REST client with token caching and retry
//! - `JobStore` / `VideoStore` implementations over the `jobs` and
//!   `videos` collections
//! - Masked updates and array-append transforms so concurrent workers
//!   never clobber each other's rendition lists

pub mod client;
pub mod error;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use repos::{FirestoreJobStore, FirestoreVideoStore, JOBS_COLLECTION, VIDEOS_COLLECTION};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
