//! Processing job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::quality::Quality;
use crate::VideoId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Persisted and published, waiting for a worker
    #[default]
    Pending,
    /// Claimed by a worker
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error; never retried
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Transcode,
    Thumbnail,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Transcode => "transcode",
            JobType::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type-specific parameters as they appear on the wire and in the job record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobPayload {
    /// Quality tag (transcode jobs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Typed unit of work: one variant per job kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTask {
    Transcode { quality: Quality },
    Thumbnail,
}

impl JobTask {
    /// The tasks a single upload fans out into, in publish order.
    pub fn fanout() -> Vec<JobTask> {
        let mut tasks = vec![JobTask::Thumbnail];
        tasks.extend(
            Quality::FANOUT
                .iter()
                .cloned()
                .map(|quality| JobTask::Transcode { quality }),
        );
        tasks
    }

    /// Decode a task from its type tag and payload.
    pub fn from_parts(tag: &str, payload: &JobPayload) -> ModelResult<Self> {
        match tag {
            "transcode" => {
                let quality = payload
                    .quality
                    .as_deref()
                    .filter(|q| !q.is_empty())
                    .ok_or(ModelError::MissingQuality)?;
                Ok(JobTask::Transcode {
                    quality: Quality::from(quality),
                })
            }
            "thumbnail" => Ok(JobTask::Thumbnail),
            other => Err(ModelError::UnknownJobType(other.to_string())),
        }
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobTask::Transcode { .. } => JobType::Transcode,
            JobTask::Thumbnail => JobType::Thumbnail,
        }
    }

    pub fn payload(&self) -> JobPayload {
        match self {
            JobTask::Transcode { quality } => JobPayload {
                quality: Some(quality.as_str().to_string()),
            },
            JobTask::Thumbnail => JobPayload::default(),
        }
    }
}

/// A processing job owned by exactly one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "JobRecord", try_from = "JobRecord")]
pub struct Job {
    pub id: JobId,
    pub video_id: VideoId,
    pub task: JobTask,
    pub status: JobStatus,
    /// Progress (0-100)
    pub progress: u8,
    pub error_message: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(video_id: VideoId, task: JobTask) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            video_id,
            task,
            status: JobStatus::Pending,
            progress: 0,
            error_message: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.task.job_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Claim the job for a worker.
    pub fn start(mut self, worker_id: impl Into<String>) -> Self {
        let now = Utc::now();
        self.status = JobStatus::Processing;
        self.worker_id = Some(worker_id.into());
        self.started_at = Some(now);
        self.updated_at = now;
        self
    }

    /// Record a progress milestone.
    pub fn with_progress(mut self, progress: i64) -> ModelResult<Self> {
        self.progress = validate_progress(progress)?;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Mark job as completed.
    pub fn complete(mut self) -> Self {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(now);
        self.updated_at = now;
        self
    }

    /// Mark job as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        self
    }
}

/// Check that a progress value lies in `0..=100`.
pub fn validate_progress(progress: i64) -> ModelResult<u8> {
    u8::try_from(progress)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(ModelError::InvalidProgress(progress))
}

/// Flat persisted form of a [`Job`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,
    pub video_id: VideoId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobRecord {
    fn from(job: Job) -> Self {
        Self {
            payload: job.task.payload(),
            job_type: job.task.job_type(),
            id: job.id,
            video_id: job.video_id,
            status: job.status,
            progress: job.progress,
            error_message: job.error_message,
            worker_id: job.worker_id,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = ModelError;

    fn try_from(record: JobRecord) -> ModelResult<Self> {
        let task = JobTask::from_parts(record.job_type.as_str(), &record.payload)?;
        Ok(Self {
            id: record.id,
            video_id: record.video_id,
            task,
            status: record.status,
            progress: record.progress,
            error_message: record.error_message,
            worker_id: record.worker_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
        })
    }
}
