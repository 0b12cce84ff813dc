//! Thumbnail extraction.

use std::path::Path;

use crate::command::FfmpegCommand;

/// Picks a representative frame, then scales it to a fixed size.
pub const THUMBNAIL_FILTER: &str = "thumbnail,scale=320:240";

/// JPEG quality scale for `-q:v` (2 is near-lossless).
pub const THUMBNAIL_JPEG_QUALITY: &str = "2";

/// Build the single-frame extraction command.
pub fn thumbnail_command(input: impl AsRef<Path>, output: impl AsRef<Path>) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_filter(THUMBNAIL_FILTER)
        .frames(1)
        .output_arg("-q:v")
        .output_arg(THUMBNAIL_JPEG_QUALITY)
}
