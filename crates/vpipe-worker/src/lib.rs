//! Video processing worker.
//!
//! This crate provides:
//! - The poll loop that takes one job message at a time off the queue
//! - Transcode and thumbnail executors
//! - Per-job structured logging and worker metrics
//! - Cooperative shutdown between iterations

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod tasks;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{Delivery, JobExecutor};
pub use logging::JobLogger;
pub use tasks::{execute, TaskContext};
