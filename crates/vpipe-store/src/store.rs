//! Persistence contracts for jobs and videos.
//!
//! Every method is a single-document operation; callers never rely on
//! multi-document transactions.

use async_trait::async_trait;

use vpipe_models::{Job, JobId, Video, VideoFormat, VideoId, VideoStatus};

use crate::error::StoreResult;

/// Persistent record of job state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `AlreadyExists` on a duplicate id.
    async fn create(&self, job: &Job) -> StoreResult<()>;

    /// Fetch a job. Fails with `NotFound` if absent.
    async fn get_by_id(&self, id: &JobId) -> StoreResult<Job>;

    /// Replace the whole document. Fails with `NotFound` if absent; last writer wins.
    async fn update(&self, job: &Job) -> StoreResult<()>;

    /// All jobs owned by a video, in no particular order.
    async fn get_by_video_id(&self, video_id: &VideoId) -> StoreResult<Vec<Job>>;

    /// Up to `limit` pending jobs, oldest first.
    async fn get_pending_jobs(&self, limit: usize) -> StoreResult<Vec<Job>>;

    /// All jobs currently `processing`.
    async fn get_active_jobs(&self) -> StoreResult<Vec<Job>>;

    /// Set only the progress field (and `updated_at`).
    async fn update_progress(&self, id: &JobId, progress: u8) -> StoreResult<()>;
}

/// Persistent record of video metadata and aggregate status.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create(&self, video: &Video) -> StoreResult<()>;

    async fn get_by_id(&self, id: &VideoId) -> StoreResult<Video>;

    /// Replace the whole document.
    async fn update(&self, video: &Video) -> StoreResult<()>;

    /// Set status (and the error message when given) without touching the
    /// artifact lists.
    async fn set_status(
        &self,
        id: &VideoId,
        status: VideoStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()>;

    /// Atomically append a rendition.
    async fn append_format(&self, id: &VideoId, format: &VideoFormat) -> StoreResult<()>;

    /// Atomically append a thumbnail key.
    async fn append_thumbnail(&self, id: &VideoId, filename: &str) -> StoreResult<()>;

    async fn list_by_status(&self, status: VideoStatus) -> StoreResult<Vec<Video>>;
}
