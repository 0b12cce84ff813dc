//! Shared data models for the vpipe video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Videos, their renditions and upload validation
//! - Processing jobs and their typed task variants
//! - Transcode quality tiers and encoder profiles

pub mod error;
pub mod job;
pub mod quality;
pub mod video;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{validate_progress, Job, JobId, JobPayload, JobRecord, JobStatus, JobTask, JobType};
pub use quality::{Quality, QualityProfile};
pub use video::{
    NewVideo, Video, VideoFormat, VideoId, VideoStatus, ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES,
};
