//! Worker metrics.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const MESSAGES_DEQUEUED_TOTAL: &str = "vpipe_worker_messages_dequeued_total";
    pub const MESSAGES_DROPPED_TOTAL: &str = "vpipe_worker_messages_dropped_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vpipe_worker_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vpipe_worker_jobs_failed_total";
    pub const QUEUE_ERRORS_TOTAL: &str = "vpipe_worker_queue_errors_total";
    pub const JOB_DURATION_SECONDS: &str = "vpipe_worker_job_duration_seconds";
}

pub fn record_message_dequeued() {
    counter!(names::MESSAGES_DEQUEUED_TOTAL).increment(1);
}

pub fn record_message_dropped(dead_lettered: bool) {
    counter!(
        names::MESSAGES_DROPPED_TOTAL,
        "dead_lettered" => dead_lettered.to_string()
    )
    .increment(1);
}

pub fn record_job_completed(job_type: &str, duration: Duration) {
    counter!(names::JOBS_COMPLETED_TOTAL, "type" => job_type.to_string()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "type" => job_type.to_string(), "outcome" => "completed")
        .record(duration.as_secs_f64());
}

pub fn record_job_failed(job_type: &str, duration: Duration) {
    counter!(names::JOBS_FAILED_TOTAL, "type" => job_type.to_string()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "type" => job_type.to_string(), "outcome" => "failed")
        .record(duration.as_secs_f64());
}

pub fn record_queue_error() {
    counter!(names::QUEUE_ERRORS_TOTAL).increment(1);
}
