//! Transcode quality tiers and their encoder profiles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality tag carried by transcode jobs.
///
/// Unrecognized tags are preserved verbatim so they round-trip through the
/// job record, and they resolve to the default profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    P480,
    P720,
    P1080,
    Other(String),
}

impl Quality {
    /// Tiers produced by fan-out, in publish order.
    pub const FANOUT: [Quality; 3] = [Quality::P480, Quality::P720, Quality::P1080];

    pub fn as_str(&self) -> &str {
        match self {
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::Other(tag) => tag,
        }
    }

    /// Encoder profile for this tier.
    ///
    /// 1080p deliberately shares the 720p profile.
    pub fn profile(&self) -> QualityProfile {
        match self {
            Quality::P480 => QualityProfile::LOW,
            Quality::P720 | Quality::P1080 | Quality::Other(_) => QualityProfile::DEFAULT,
        }
    }
}

impl From<&str> for Quality {
    fn from(s: &str) -> Self {
        match s {
            "480p" => Quality::P480,
            "720p" => Quality::P720,
            "1080p" => Quality::P1080,
            other => Quality::Other(other.to_string()),
        }
    }
}

impl From<String> for Quality {
    fn from(s: String) -> Self {
        Quality::from(s.as_str())
    }
}

impl From<Quality> for String {
    fn from(q: Quality) -> Self {
        q.as_str().to_string()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scale and rate-control parameters for one transcode tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    /// Output height in pixels; width follows the source aspect ratio.
    pub scale_height: u32,
    /// Peak bitrate in kbit/s.
    pub max_bitrate_kbps: u32,
    /// Rate-control buffer in kbit.
    pub buffer_size_kbps: u32,
}

impl QualityProfile {
    pub const LOW: QualityProfile = QualityProfile {
        scale_height: 480,
        max_bitrate_kbps: 1_000,
        buffer_size_kbps: 2_000,
    };

    pub const DEFAULT: QualityProfile = QualityProfile {
        scale_height: 720,
        max_bitrate_kbps: 2_500,
        buffer_size_kbps: 5_000,
    };

    /// Video filter expression, e.g. `scale=-2:480`.
    pub fn scale_filter(&self) -> String {
        format!("scale=-2:{}", self.scale_height)
    }

    /// `-maxrate` argument, e.g. `1M` or `2.5M`.
    pub fn max_rate_arg(&self) -> String {
        megabits(self.max_bitrate_kbps)
    }

    /// `-bufsize` argument.
    pub fn buffer_size_arg(&self) -> String {
        megabits(self.buffer_size_kbps)
    }
}

fn megabits(kbps: u32) -> String {
    if kbps % 1_000 == 0 {
        format!("{}M", kbps / 1_000)
    } else {
        format!("{}M", f64::from(kbps) / 1_000.0)
    }
}
