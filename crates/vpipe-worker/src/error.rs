//! Worker error types.

use thiserror::Error;

use vpipe_models::ModelError;
use vpipe_pipeline::PipelineError;
use vpipe_queue::QueueError;
use vpipe_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(QueueError),

    #[error("Malformed message: {0}")]
    Decode(String),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Errors that stop the loop for a back-off instead of failing a job.
    pub fn is_loop_level(&self) -> bool {
        matches!(self, WorkerError::QueueUnavailable(_))
    }
}

impl From<QueueError> for WorkerError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Decode(msg) => WorkerError::Decode(msg),
            QueueError::Json(e) => WorkerError::Decode(e.to_string()),
            other => WorkerError::QueueUnavailable(other),
        }
    }
}

impl From<ModelError> for WorkerError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::UnknownJobType(tag) => WorkerError::UnknownJobType(tag),
            other => WorkerError::InvalidJob(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_level_classification() {
        assert!(WorkerError::from(QueueError::connection_failed("refused")).is_loop_level());
        assert!(!WorkerError::from(QueueError::decode("bad json")).is_loop_level());
        assert!(!WorkerError::download_failed("missing").is_loop_level());
        assert!(!WorkerError::from(StoreError::unavailable("down")).is_loop_level());
    }

    #[test]
    fn test_unknown_job_type_message() {
        let err = WorkerError::from(ModelError::UnknownJobType("watermark".to_string()));
        assert_eq!(err.to_string(), "unknown job type: watermark");

        let err = WorkerError::from(ModelError::MissingQuality);
        assert!(matches!(err, WorkerError::InvalidJob(_)));
    }
}
