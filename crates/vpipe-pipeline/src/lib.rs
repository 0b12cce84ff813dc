//! Video pipeline orchestration.
//!
//! This crate provides:
//! - `FanoutScheduler`: one upload becomes a thumbnail job and three
//!   transcode jobs, persisted then published
//! - `CompletionAggregator`: full re-scan of a video's jobs to reach `ready`
//! - `JobLifecycle`: start / progress / complete / fail plus job queries
//! - `VideoService`: upload validation and registration

pub mod aggregator;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod scheduler;
pub mod video_service;

pub use aggregator::CompletionAggregator;
pub use error::{PipelineError, PipelineResult};
pub use lifecycle::JobLifecycle;
pub use scheduler::FanoutScheduler;
pub use video_service::VideoService;
