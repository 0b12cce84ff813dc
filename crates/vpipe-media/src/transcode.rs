//! H.264/AAC rendition encoding.

use std::path::Path;

use vpipe_models::QualityProfile;

use crate::command::FfmpegCommand;

const VIDEO_CODEC: &str = "libx264";
const PRESET: &str = "medium";
const CRF: u8 = 23;
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";

/// Build the transcode command for one quality profile.
pub fn transcode_command(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    profile: &QualityProfile,
) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_codec(VIDEO_CODEC)
        .preset(PRESET)
        .crf(CRF)
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(AUDIO_BITRATE)
        .output_args(["-movflags", "+faststart"])
        .video_filter(profile.scale_filter())
        .rate_control(profile.max_rate_arg(), profile.buffer_size_arg())
}
