//! Model-level errors.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or decoding model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("transcode job is missing a quality")]
    MissingQuality,

    #[error("progress must be between 0 and 100, got {0}")]
    InvalidProgress(i64),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
