//! Work queue for video jobs.
//!
//! This crate provides:
//! - The blocking FIFO `WorkQueue` contract
//! - A Redis list implementation and an in-memory one
//! - The job wire message and the publisher that enqueues it

pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use message::JobMessage;
pub use publisher::JobPublisher;
pub use queue::{QueueConfig, RedisQueue, WorkQueue, VIDEO_JOBS_QUEUE};
