//! Video records and upload validation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::job::JobStatus;

/// Largest accepted upload (1 GiB).
pub const MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// Accepted source container extensions (lowercase, with dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mkv"];

/// Unique identifier for an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Aggregate processing status of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Stored, not yet fanned out
    #[default]
    Uploaded,
    /// Jobs published
    Processing,
    /// Every job completed
    Ready,
    /// At least one job failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(VideoStatus::Uploaded),
            "processing" => Some(VideoStatus::Processing),
            "ready" => Some(VideoStatus::Ready),
            "failed" => Some(VideoStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Failed)
    }

    /// Derive the status implied by a video's job statuses.
    ///
    /// Any failure wins; `Ready` needs at least one job and all completed.
    pub fn from_jobs<'a>(statuses: impl IntoIterator<Item = &'a JobStatus>) -> Self {
        let mut seen = 0usize;
        let mut all_completed = true;
        for status in statuses {
            seen += 1;
            match status {
                JobStatus::Failed => return VideoStatus::Failed,
                JobStatus::Completed => {}
                JobStatus::Pending | JobStatus::Processing => all_completed = false,
            }
        }
        if seen > 0 && all_completed {
            VideoStatus::Ready
        } else {
            VideoStatus::Processing
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transcoded rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoFormat {
    /// Quality tag, e.g. `720p`
    pub quality: String,
    /// Object key of the rendition
    pub filename: String,
    /// Size in bytes
    pub size: u64,
}

/// Video record stored in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uploaded_by: String,
    pub original_filename: String,
    /// Duration in seconds (0 when unknown)
    #[serde(default)]
    pub duration: f64,
    /// Source size in bytes
    pub size: u64,
    #[serde(default)]
    pub status: VideoStatus,
    /// Renditions, append-only
    #[serde(default)]
    pub formats: Vec<VideoFormat>,
    /// Thumbnail object keys, append-only
    #[serde(default)]
    pub thumbnails: Vec<String>,
    /// Error message (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a video record in `uploaded` from a validated upload.
    pub fn new(upload: NewVideo) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            title: upload.title.trim().to_string(),
            description: upload.description,
            uploaded_by: upload.uploaded_by,
            original_filename: upload.original_filename,
            duration: upload.duration.unwrap_or(0.0),
            size: upload.size,
            status: VideoStatus::Uploaded,
            formats: Vec::new(),
            thumbnails: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Extension of the original filename including the dot, or "".
    pub fn original_extension(&self) -> String {
        file_extension(&self.original_filename)
    }

    pub fn with_status(mut self, status: VideoStatus, error: Option<String>) -> Self {
        self.status = status;
        if error.is_some() {
            self.error_message = error;
        }
        self.updated_at = Utc::now();
        self
    }

    pub fn add_format(&mut self, format: VideoFormat) {
        self.formats.push(format);
        self.updated_at = Utc::now();
    }

    pub fn add_thumbnail(&mut self, filename: impl Into<String>) {
        self.thumbnails.push(filename.into());
        self.updated_at = Utc::now();
    }

    pub fn has_format(&self, quality: &str) -> bool {
        self.formats.iter().any(|f| f.quality == quality)
    }
}

/// An upload awaiting registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NewVideo {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uploaded_by: String,
    pub original_filename: String,
    pub size: u64,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl NewVideo {
    /// Validate the upload.
    pub fn validate(&self) -> ModelResult<()> {
        if self.title.trim().is_empty() {
            return Err(ModelError::validation("Title is required"));
        }

        if self.original_filename.trim().is_empty() {
            return Err(ModelError::validation("Filename is required"));
        }

        let ext = file_extension(&self.original_filename).to_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ModelError::validation(format!(
                "Unsupported file type '{}'",
                ext
            )));
        }

        if self.size == 0 {
            return Err(ModelError::validation("File is empty"));
        }

        if self.size > MAX_UPLOAD_BYTES {
            return Err(ModelError::validation("File exceeds the 1 GiB limit"));
        }

        Ok(())
    }
}

fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}
