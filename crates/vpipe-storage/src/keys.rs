//! Bucket names and object key layout.

use vpipe_models::{Quality, VideoId};

pub const VIDEO_MP4: &str = "video/mp4";
pub const IMAGE_JPEG: &str = "image/jpeg";

/// Buckets the pipeline reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    /// Originals and transcoded renditions
    pub videos: String,
    pub thumbnails: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            videos: "videos".to_string(),
            thumbnails: "thumbnails".to_string(),
        }
    }
}

impl Buckets {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            videos: std::env::var("VIDEOS_BUCKET").unwrap_or(defaults.videos),
            thumbnails: std::env::var("THUMBNAILS_BUCKET").unwrap_or(defaults.thumbnails),
        }
    }
}

/// Key of an uploaded original; `extension` includes the dot.
pub fn original_key(video_id: &VideoId, extension: &str) -> String {
    format!("videos/original/{}{}", video_id, extension)
}

/// File name of a transcoded rendition, as listed in the video's formats.
pub fn processed_filename(video_id: &VideoId, quality: &Quality) -> String {
    format!("{}_{}.mp4", video_id, quality.as_str())
}

/// Key of a transcoded rendition.
pub fn processed_key(video_id: &VideoId, quality: &Quality) -> String {
    format!("videos/processed/{}", processed_filename(video_id, quality))
}

pub fn thumbnail_key(video_id: &VideoId) -> String {
    format!("{}_thumb.jpg", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = VideoId::from("abc");
        assert_eq!(original_key(&id, ".mov"), "videos/original/abc.mov");
        assert_eq!(
            processed_key(&id, &Quality::P1080),
            "videos/processed/abc_1080p.mp4"
        );
        assert_eq!(
            processed_key(&id, &Quality::from("4k")),
            "videos/processed/abc_4k.mp4"
        );
        assert_eq!(processed_filename(&id, &Quality::P480), "abc_480p.mp4");
        assert_eq!(thumbnail_key(&id), "abc_thumb.jpg");
    }

    #[test]
    fn test_default_buckets() {
        let buckets = Buckets::default();
        assert_eq!(buckets.videos, "videos");
        assert_eq!(buckets.thumbnails, "thumbnails");
    }
}
