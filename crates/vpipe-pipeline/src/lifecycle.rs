//! Job lifecycle transitions and read queries.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use vpipe_models::{validate_progress, Job, JobId, JobStatus, VideoId, VideoStatus};
use vpipe_store::{JobStore, VideoStore};

use crate::aggregator::CompletionAggregator;
use crate::error::PipelineResult;
use crate::metrics::record_video_failed;

/// Owns every job state change after fan-out.
///
/// Transitions are `pending -> processing -> {completed | failed}`; there is
/// no lease, so a job whose worker died stays `processing` until someone
/// acts on [`JobLifecycle::stale_jobs`].
#[derive(Clone)]
pub struct JobLifecycle {
    jobs: Arc<dyn JobStore>,
    videos: Arc<dyn VideoStore>,
    aggregator: CompletionAggregator,
}

impl JobLifecycle {
    pub fn new(jobs: Arc<dyn JobStore>, videos: Arc<dyn VideoStore>) -> Self {
        let aggregator = CompletionAggregator::new(jobs.clone(), videos.clone());
        Self {
            jobs,
            videos,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &CompletionAggregator {
        &self.aggregator
    }

    /// Claim a pending job for `worker_id`.
    ///
    /// Returns `None` without writing when the job is no longer pending.
    pub async fn start(&self, id: &JobId, worker_id: &str) -> PipelineResult<Option<Job>> {
        let job = self.jobs.get_by_id(id).await?;
        if job.status != JobStatus::Pending {
            warn!(
                job_id = %id,
                status = %job.status,
                "Job is not pending, skipping"
            );
            return Ok(None);
        }

        let job = job.start(worker_id);
        self.jobs.update(&job).await?;
        info!(job_id = %id, worker_id, "Job started");
        Ok(Some(job))
    }

    /// Record a progress milestone (`0..=100`).
    pub async fn progress(&self, id: &JobId, progress: i64) -> PipelineResult<()> {
        let progress = validate_progress(progress)?;
        self.jobs.update_progress(id, progress).await?;
        Ok(())
    }

    /// Mark the job completed, then re-evaluate its video.
    pub async fn complete(&self, job: Job) -> PipelineResult<(Job, VideoStatus)> {
        let job = self.finish(&job.id, Job::complete).await?;
        info!(job_id = %job.id, video_id = %job.video_id, "Job completed");

        let status = self.aggregator.evaluate(&job.video_id).await?;
        Ok((job, status))
    }

    /// Mark the job failed and its video failed with the same message.
    ///
    /// Both writes are attempted even if the first one fails; the first
    /// error is returned.
    pub async fn fail(&self, job: Job, error: &str) -> PipelineResult<Job> {
        let job_write = self.finish(&job.id, |stored| stored.fail(error)).await;
        let video_write = self
            .videos
            .set_status(&job.video_id, VideoStatus::Failed, Some(error))
            .await;

        warn!(
            job_id = %job.id,
            video_id = %job.video_id,
            "Job failed: {}", error
        );
        if video_write.is_ok() {
            record_video_failed();
        }

        let failed = job_write?;
        video_write?;
        Ok(failed)
    }

    /// Apply a terminal transition to the stored copy of the job.
    ///
    /// Progress is only ever written through `update_progress`, so the
    /// caller's copy is stale by the time the task ends.
    async fn finish(
        &self,
        id: &JobId,
        transition: impl FnOnce(Job) -> Job,
    ) -> PipelineResult<Job> {
        let job = transition(self.jobs.get_by_id(id).await?);
        self.jobs.update(&job).await?;
        Ok(job)
    }

    pub async fn get_job(&self, id: &JobId) -> PipelineResult<Job> {
        Ok(self.jobs.get_by_id(id).await?)
    }

    pub async fn jobs_for_video(&self, video_id: &VideoId) -> PipelineResult<Vec<Job>> {
        Ok(self.jobs.get_by_video_id(video_id).await?)
    }

    pub async fn pending_jobs(&self, limit: usize) -> PipelineResult<Vec<Job>> {
        Ok(self.jobs.get_pending_jobs(limit).await?)
    }

    pub async fn active_jobs(&self) -> PipelineResult<Vec<Job>> {
        Ok(self.jobs.get_active_jobs().await?)
    }

    /// Processing jobs started more than `older_than` ago. Read-only.
    pub async fn stale_jobs(&self, older_than: Duration) -> PipelineResult<Vec<Job>> {
        let cutoff = Utc::now() - older_than;
        let mut stale: Vec<Job> = self
            .jobs
            .get_active_jobs()
            .await?
            .into_iter()
            .filter(|j| j.started_at.unwrap_or(j.updated_at) < cutoff)
            .collect();
        stale.sort_by_key(|j| j.started_at.unwrap_or(j.updated_at));
        Ok(stale)
    }
}
