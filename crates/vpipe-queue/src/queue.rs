//! Work queue on Redis lists.
//!
//! Producers `LPUSH` onto the head and consumers `BRPOP` from the tail, which
//! gives FIFO order per queue name and hands each message to exactly one
//! consumer. There is no acknowledgement: a popped message is gone.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::QueueResult;

/// Default queue name for video jobs.
pub const VIDEO_JOBS_QUEUE: &str = "video_jobs";

/// Shortest BRPOP wait; a timeout of 0 tells Redis to block forever.
const MIN_BLOCK_SECS: f64 = 0.01;

/// Blocking FIFO hand-off channel.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append a message to the tail of `queue`.
    async fn enqueue(&self, queue: &str, message: &str) -> QueueResult<()>;

    /// Remove and return the head of `queue`, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<String>>;
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// List name for video jobs
    pub queue_name: String,
    /// List receiving undecodable messages (disabled when `None`)
    pub dead_letter_queue: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: VIDEO_JOBS_QUEUE.to_string(),
            dead_letter_queue: None,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .or_else(|_| std::env::var("REDIS_URI"))
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_name: std::env::var("QUEUE_NAME")
                .unwrap_or_else(|_| VIDEO_JOBS_QUEUE.to_string()),
            dead_letter_queue: std::env::var("QUEUE_DEAD_LETTER_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Redis-backed work queue.
pub struct RedisQueue {
    client: redis::Client,
}

impl RedisQueue {
    /// Create a new queue client. No connection is made until first use.
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(&QueueConfig::from_env())
    }

    /// Number of messages waiting in `queue`.
    pub async fn len(&self, queue: &str) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: usize = redis::cmd("LLEN").arg(queue).query_async(&mut conn).await?;
        Ok(len)
    }

    /// Round-trip a PING to verify connectivity.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn enqueue(&self, queue: &str, message: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let depth: i64 = redis::cmd("LPUSH")
            .arg(queue)
            .arg(message)
            .query_async(&mut conn)
            .await?;

        info!("Enqueued message on {} (depth {})", queue, depth);
        Ok(())
    }

    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // BRPOP replies with nil on timeout, otherwise [list, element].
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(block_timeout(timeout))
            .query_async(&mut conn)
            .await?;

        match reply {
            Some((_, message)) => {
                debug!("Dequeued message from {}", queue);
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}

fn block_timeout(timeout: Duration) -> f64 {
    timeout.as_secs_f64().max(MIN_BLOCK_SECS)
}
