//! Completion aggregation.

use std::sync::Arc;

use tracing::{debug, info};

use vpipe_models::{JobStatus, VideoId, VideoStatus};
use vpipe_store::{JobStore, VideoStore};

use crate::error::PipelineResult;
use crate::metrics::record_video_ready;

/// Re-derives a video's status from all of its jobs.
///
/// Every evaluation is a full re-scan, so concurrent callers that both see
/// every job completed both write `ready`; the writes are identical.
#[derive(Clone)]
pub struct CompletionAggregator {
    jobs: Arc<dyn JobStore>,
    videos: Arc<dyn VideoStore>,
}

impl CompletionAggregator {
    pub fn new(jobs: Arc<dyn JobStore>, videos: Arc<dyn VideoStore>) -> Self {
        Self { jobs, videos }
    }

    /// Evaluate the video and mark it `ready` once every job has completed.
    ///
    /// Only the `ready` transition is written here; failures are recorded
    /// by whoever observes the failing job. Returns the derived status.
    pub async fn evaluate(&self, video_id: &VideoId) -> PipelineResult<VideoStatus> {
        let jobs = self.jobs.get_by_video_id(video_id).await?;
        let status = VideoStatus::from_jobs(jobs.iter().map(|j| &j.status));

        if status == VideoStatus::Ready {
            self.videos
                .set_status(video_id, VideoStatus::Ready, None)
                .await?;
            record_video_ready();
            info!(video_id = %video_id, jobs = jobs.len(), "All jobs completed, video ready");
        } else {
            let completed = jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .count();
            debug!(
                video_id = %video_id,
                completed,
                total = jobs.len(),
                "Video not ready yet"
            );
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpipe_models::{Job, JobTask, NewVideo, Video};
    use vpipe_store::{MemoryJobStore, MemoryVideoStore};

    async fn setup(statuses: &[JobStatus]) -> (Arc<MemoryJobStore>, Arc<MemoryVideoStore>, Video) {
        let jobs = Arc::new(MemoryJobStore::new());
        let videos = Arc::new(MemoryVideoStore::new());
        let video = Video::new(NewVideo {
            title: "t".to_string(),
            original_filename: "a.mp4".to_string(),
            size: 1,
            ..Default::default()
        })
        .with_status(VideoStatus::Processing, None);
        videos.create(&video).await.unwrap();

        for status in statuses {
            let mut job = Job::new(video.id.clone(), JobTask::Thumbnail);
            job.status = *status;
            jobs.create(&job).await.unwrap();
        }
        (jobs, videos, video)
    }

    #[tokio::test]
    async fn test_no_jobs_is_not_ready() {
        let (jobs, videos, video) = setup(&[]).await;
        let aggregator = CompletionAggregator::new(jobs, videos.clone());

        let status = aggregator.evaluate(&video.id).await.unwrap();
        assert_eq!(status, VideoStatus::Processing);
        assert_eq!(
            videos.get_by_id(&video.id).await.unwrap().status,
            VideoStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_partial_completion_leaves_video_alone() {
        let (jobs, videos, video) = setup(&[JobStatus::Completed, JobStatus::Processing]).await;
        let writes_before = videos.write_count();
        let aggregator = CompletionAggregator::new(jobs, videos.clone());

        aggregator.evaluate(&video.id).await.unwrap();
        assert_eq!(videos.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_all_completed_marks_ready() {
        let (jobs, videos, video) = setup(&[JobStatus::Completed; 4]).await;
        let aggregator = CompletionAggregator::new(jobs, videos.clone());

        assert_eq!(aggregator.evaluate(&video.id).await.unwrap(), VideoStatus::Ready);
        assert_eq!(
            videos.get_by_id(&video.id).await.unwrap().status,
            VideoStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_evaluate_is_idempotent() {
        let (jobs, videos, video) = setup(&[JobStatus::Completed; 2]).await;
        let aggregator = CompletionAggregator::new(jobs, videos.clone());

        aggregator.evaluate(&video.id).await.unwrap();
        let first = videos.get_by_id(&video.id).await.unwrap();
        aggregator.evaluate(&video.id).await.unwrap();
        let second = videos.get_by_id(&video.id).await.unwrap();

        assert_eq!(first.status, VideoStatus::Ready);
        assert_eq!(second.status, VideoStatus::Ready);
        assert_eq!(first.formats, second.formats);
        assert_eq!(first.error_message, second.error_message);
    }

    #[tokio::test]
    async fn test_failed_sibling_is_reported_not_written() {
        let (jobs, videos, video) = setup(&[JobStatus::Completed, JobStatus::Failed]).await;
        let writes_before = videos.write_count();
        let aggregator = CompletionAggregator::new(jobs, videos.clone());

        assert_eq!(aggregator.evaluate(&video.id).await.unwrap(), VideoStatus::Failed);
        assert_eq!(videos.write_count(), writes_before);
    }
}
