//! Wire format of queued job messages.

use serde::{Deserialize, Serialize};

use vpipe_models::{Job, JobId, JobPayload, JobTask, ModelResult, VideoId};

use crate::error::{QueueError, QueueResult};

/// Message placed on the work queue for one job.
///
/// `type` stays a free string on the wire so an unrecognized tag still
/// decodes and can be failed against its job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Job ID
    pub id: JobId,
    /// Owning video
    pub video_id: VideoId,
    /// Job type tag (`transcode` or `thumbnail`)
    #[serde(rename = "type")]
    pub job_type: String,
    /// Type-specific parameters
    #[serde(default)]
    pub payload: JobPayload,
}

impl JobMessage {
    /// Build the message for a persisted job.
    pub fn for_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            video_id: job.video_id.clone(),
            job_type: job.job_type().as_str().to_string(),
            payload: job.task.payload(),
        }
    }

    pub fn encode(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a raw queue payload.
    pub fn decode(raw: &str) -> QueueResult<Self> {
        let message: JobMessage =
            serde_json::from_str(raw).map_err(|e| QueueError::decode(e.to_string()))?;
        if message.id.as_str().is_empty() {
            return Err(QueueError::decode("message has an empty job id"));
        }
        Ok(message)
    }

    /// Resolve the typed task by matching the type tag.
    pub fn task(&self) -> ModelResult<JobTask> {
        JobTask::from_parts(&self.job_type, &self.payload)
    }
}
