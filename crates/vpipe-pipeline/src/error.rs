//! Pipeline error types.

use thiserror::Error;

use vpipe_models::{ModelError, VideoId, VideoStatus};
use vpipe_queue::QueueError;
use vpipe_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Video {video_id} is {status}, only uploaded videos can be scheduled")]
    NotSchedulable {
        video_id: VideoId,
        status: VideoStatus,
    },

    #[error(transparent)]
    Model(ModelError),
}

impl PipelineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::Store(e) if e.is_not_found())
    }
}

impl From<ModelError> for PipelineError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) => PipelineError::Validation(msg),
            other => PipelineError::Model(other),
        }
    }
}
