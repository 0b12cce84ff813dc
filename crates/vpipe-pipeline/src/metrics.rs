//! Pipeline metrics.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SCHEDULED_TOTAL: &str = "vpipe_jobs_scheduled_total";
    pub const VIDEOS_READY_TOTAL: &str = "vpipe_videos_ready_total";
    pub const VIDEOS_FAILED_TOTAL: &str = "vpipe_videos_failed_total";
    pub const UPLOADS_REGISTERED_TOTAL: &str = "vpipe_uploads_registered_total";
}

pub fn record_job_scheduled(job_type: &str) {
    counter!(names::JOBS_SCHEDULED_TOTAL, "type" => job_type.to_string()).increment(1);
}

pub fn record_video_ready() {
    counter!(names::VIDEOS_READY_TOTAL).increment(1);
}

pub fn record_video_failed() {
    counter!(names::VIDEOS_FAILED_TOTAL).increment(1);
}

pub fn record_upload_registered() {
    counter!(names::UPLOADS_REGISTERED_TOTAL).increment(1);
}
