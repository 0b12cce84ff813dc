//! In-process work queue for tests and single-binary runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{QueueError, QueueResult};
use crate::queue::WorkQueue;

/// FIFO queues keyed by name, shared by any number of producers and consumers.
#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting in `queue`.
    pub fn len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .map(|q| q.get(queue).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Snapshot of the messages waiting in `queue`, head first.
    pub fn peek_all(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .map(|q| q.get(queue).map(|d| d.iter().cloned().collect()).unwrap_or_default())
            .unwrap_or_default()
    }

    fn pop(&self, queue: &str) -> QueueResult<Option<String>> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| QueueError::dequeue_failed("queue lock poisoned"))?;
        Ok(queues.get_mut(queue).and_then(VecDeque::pop_front))
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(&self, queue: &str, message: &str) -> QueueResult<()> {
        {
            let mut queues = self
                .queues
                .lock()
                .map_err(|_| QueueError::enqueue_failed("queue lock poisoned"))?;
            queues
                .entry(queue.to_string())
                .or_default()
                .push_back(message.to_string());
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent push is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.pop(queue)? {
                return Ok(Some(message));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.pop(queue);
            }
        }
    }
}
