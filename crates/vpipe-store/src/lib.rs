//! Job and video persistence contracts.
//!
//! The pipeline only talks to the `JobStore` and `VideoStore` traits; the
//! Firestore implementation lives in `vpipe-firestore` and the in-memory one
//! here serves tests and local runs.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryJobStore, MemoryVideoStore};
pub use store::{JobStore, VideoStore};
