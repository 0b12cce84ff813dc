//! Fan-out of one uploaded video into its processing jobs.

use std::sync::Arc;

use tracing::{info, warn};

use vpipe_models::{Job, JobTask, VideoId, VideoStatus};
use vpipe_queue::JobPublisher;
use vpipe_store::{JobStore, VideoStore};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_job_scheduled;

/// Creates the thumbnail and transcode jobs for a video and publishes them.
///
/// Each job is persisted before its message is enqueued. A crash between
/// the two leaves a `pending` job that no worker will ever receive; nothing
/// rescans for those.
#[derive(Clone)]
pub struct FanoutScheduler {
    jobs: Arc<dyn JobStore>,
    videos: Arc<dyn VideoStore>,
    publisher: JobPublisher,
}

impl FanoutScheduler {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        videos: Arc<dyn VideoStore>,
        publisher: JobPublisher,
    ) -> Self {
        Self {
            jobs,
            videos,
            publisher,
        }
    }

    /// Move an `uploaded` video to `processing` and fan out one job per task.
    ///
    /// Any other status is rejected before anything is written or
    /// published. Returns the jobs in publish order.
    pub async fn schedule(&self, video_id: &VideoId) -> PipelineResult<Vec<Job>> {
        let video = self.videos.get_by_id(video_id).await?;
        if video.status != VideoStatus::Uploaded {
            warn!(
                video_id = %video_id,
                status = %video.status,
                "Video is not awaiting processing, refusing to schedule"
            );
            return Err(PipelineError::NotSchedulable {
                video_id: video_id.clone(),
                status: video.status,
            });
        }

        self.videos
            .set_status(video_id, VideoStatus::Processing, None)
            .await?;

        let mut scheduled = Vec::new();
        for task in JobTask::fanout() {
            let job = Job::new(video_id.clone(), task);
            self.jobs.create(&job).await?;

            if let Err(e) = self.publisher.publish(&job).await {
                warn!(
                    job_id = %job.id,
                    video_id = %video_id,
                    "Job persisted but not published: {}", e
                );
                return Err(e.into());
            }

            record_job_scheduled(job.job_type().as_str());
            scheduled.push(job);
        }

        info!(
            video_id = %video_id,
            jobs = scheduled.len(),
            "Scheduled processing jobs"
        );
        Ok(scheduled)
    }
}
