//! FFmpeg CLI wrapper for video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner bounded by a timeout that reports the exit status and last
//!   stderr line on failure
//! - The `Transcoder` contract used by the worker's task executors

pub mod command;
pub mod error;
pub mod thumbnail;
pub mod transcode;
pub mod transcoder;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use thumbnail::{thumbnail_command, THUMBNAIL_FILTER};
pub use transcode::transcode_command;
pub use transcoder::{FfmpegTranscoder, Transcoder, DEFAULT_TIMEOUT_SECS};
