//! Job publisher.

use std::sync::Arc;

use tracing::info;

use vpipe_models::Job;

use crate::error::QueueResult;
use crate::message::JobMessage;
use crate::queue::WorkQueue;

/// Turns persisted jobs into wire messages on a named queue.
#[derive(Clone)]
pub struct JobPublisher {
    queue: Arc<dyn WorkQueue>,
    queue_name: String,
}

impl JobPublisher {
    pub fn new(queue: Arc<dyn WorkQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Enqueue a message for `job`.
    pub async fn publish(&self, job: &Job) -> QueueResult<()> {
        let payload = JobMessage::for_job(job).encode()?;
        self.queue.enqueue(&self.queue_name, &payload).await?;
        info!(
            job_id = %job.id,
            video_id = %job.video_id,
            job_type = %job.job_type(),
            "Published job to {}", self.queue_name
        );
        Ok(())
    }
}
