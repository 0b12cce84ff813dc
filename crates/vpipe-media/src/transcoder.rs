//! Transcoding tool contract and its FFmpeg implementation.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use vpipe_models::QualityProfile;

use crate::command::FfmpegRunner;
use crate::error::MediaResult;
use crate::thumbnail::thumbnail_command;
use crate::transcode::transcode_command;

/// Default upper bound on a single tool invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// External tool that turns a source file into derived artifacts.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `input` into `output` using `profile`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &QualityProfile,
    ) -> MediaResult<()>;

    /// Write one representative frame of `input` to `output` as JPEG.
    async fn extract_thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// Transcoder that shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

impl FfmpegTranscoder {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout_secs),
        }
    }

    /// Read `FFMPEG_TIMEOUT_SECS`, falling back to the default.
    pub fn from_env() -> Self {
        let timeout = std::env::var("FFMPEG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(timeout)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &QualityProfile,
    ) -> MediaResult<()> {
        info!(
            height = profile.scale_height,
            max_rate = %profile.max_rate_arg(),
            "Transcoding {}",
            input.display()
        );
        self.runner
            .run(&transcode_command(input, output, profile))
            .await
    }

    async fn extract_thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        info!("Extracting thumbnail from {}", input.display());
        self.runner.run(&thumbnail_command(input, output)).await
    }
}
