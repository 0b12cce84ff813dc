//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vpipe_queue::VIDEO_JOBS_QUEUE;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity recorded on every job this worker starts
    pub worker_id: String,
    /// Queue to poll
    pub queue_name: String,
    /// Where undecodable messages go; dropped when unset
    pub dead_letter_queue: Option<String>,
    /// Blocking dequeue timeout
    pub poll_timeout: Duration,
    /// Sleep after a queue connectivity error
    pub error_backoff: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Parent directory for per-task scratch space
    pub work_dir: PathBuf,
    /// Prometheus listener address
    pub metrics_addr: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            queue_name: VIDEO_JOBS_QUEUE.to_string(),
            dead_letter_queue: None,
            poll_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/video-processing"),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            worker_id: std::env::var("WORKER_ID")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(default_worker_id),
            queue_name: std::env::var("QUEUE_NAME")
                .unwrap_or_else(|_| VIDEO_JOBS_QUEUE.to_string()),
            dead_letter_queue: std::env::var("QUEUE_DEAD_LETTER_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            // zero would make BRPOP block forever
            poll_timeout: Duration::from_secs(
                std::env::var("WORKER_POLL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(5)
                    .max(1),
            ),
            error_backoff: Duration::from_secs(
                std::env::var("WORKER_ERROR_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/video-processing")),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

fn default_worker_id() -> String {
    format!("worker-{}", chrono::Utc::now().timestamp())
}
