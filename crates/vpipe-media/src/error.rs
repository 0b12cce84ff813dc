//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{program} not found in PATH")]
    ToolNotFound { program: String },

    #[error("{message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("FFmpeg timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    ///
    /// The display text carries the exit status and, when present, the last
    /// line FFmpeg wrote to stderr.
    pub fn ffmpeg_failed(stderr: Option<String>, exit_code: Option<i32>) -> Self {
        let status = match exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "was terminated by a signal".to_string(),
        };
        let message = match &stderr {
            Some(line) => format!("ffmpeg {}: {}", status, line),
            None => format!("ffmpeg {}", status),
        };
        Self::FfmpegFailed {
            message,
            stderr,
            exit_code,
        }
    }
}
