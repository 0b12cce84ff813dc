//! Task executors.
//!
//! Both executors share one shape: pull the original into a scratch
//! directory, run the tool, upload the artifact and append its metadata to
//! the video. Progress is reported only at fixed milestones.

mod thumbnail;
mod transcode;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use vpipe_media::Transcoder;
use vpipe_models::{Job, JobTask, Video};
use vpipe_pipeline::JobLifecycle;
use vpipe_storage::{download_to_file, original_key, Buckets, ObjectStore};
use vpipe_store::{JobStore, VideoStore};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Collaborators every task executor needs.
#[derive(Clone)]
pub struct TaskContext {
    pub lifecycle: JobLifecycle,
    pub videos: Arc<dyn VideoStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub buckets: Buckets,
    pub work_dir: PathBuf,
}

/// Run the executor for `task` against a started job.
pub async fn execute(
    ctx: &TaskContext,
    job: &Job,
    task: &JobTask,
    logger: &JobLogger,
) -> WorkerResult<()> {
    match task {
        JobTask::Transcode { quality } => transcode::run(ctx, job, quality, logger).await,
        JobTask::Thumbnail => thumbnail::run(ctx, job, logger).await,
    }
}

impl TaskContext {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
        buckets: Buckets,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lifecycle: JobLifecycle::new(jobs, videos.clone()),
            videos,
            storage,
            transcoder,
            buckets,
            work_dir: work_dir.into(),
        }
    }

    /// Fresh scratch directory for one job, removed when dropped.
    async fn scratch(&self, job: &Job) -> WorkerResult<TempDir> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", job.id))
            .tempdir_in(&self.work_dir)?;
        Ok(dir)
    }

    /// Record a progress milestone; a failed write does not fail the task.
    async fn milestone(&self, job: &Job, logger: &JobLogger, progress: u8, message: &str) {
        logger.log_progress(progress, message);
        if let Err(e) = self.lifecycle.progress(&job.id, i64::from(progress)).await {
            logger.log_warning(&format!("Failed to record progress {}: {}", progress, e));
        }
    }

    /// Download the video's original into `dir`, returning the local path.
    async fn fetch_original(&self, video: &Video, dir: &Path) -> WorkerResult<PathBuf> {
        let extension = video.original_extension();
        let key = original_key(&video.id, &extension);
        let local = dir.join(format!("original{}", extension));

        download_to_file(self.storage.as_ref(), &self.buckets.videos, &key, &local)
            .await
            .map_err(|e| WorkerError::download_failed(e.to_string()))?;
        Ok(local)
    }
}
