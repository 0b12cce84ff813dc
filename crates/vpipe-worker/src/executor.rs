//! Job executor: the worker poll loop.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use vpipe_models::{Job, JobId};
use vpipe_queue::{JobMessage, QueueError, WorkQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics::{
    record_job_completed, record_job_failed, record_message_dequeued, record_message_dropped,
    record_queue_error,
};
use crate::tasks::{self, TaskContext};

/// What one poll of the queue ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Dequeue timed out with nothing to do.
    Empty,
    /// The message could not be decoded and was dropped.
    Dropped,
    /// The referenced job was no longer pending.
    Skipped(JobId),
    Completed(Job),
    Failed(Job),
}

/// Pulls job messages one at a time and runs them to a terminal state.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<dyn WorkQueue>,
    ctx: TaskContext,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: Arc<dyn WorkQueue>, ctx: TaskContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            queue,
            ctx,
            shutdown,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Run until [`JobExecutor::shutdown`] is called.
    ///
    /// The shutdown flag is checked between iterations only; a message that
    /// has been dequeued is always run to completion.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            worker_id = %self.config.worker_id,
            queue = %self.config.queue_name,
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(Delivery::Empty) => {}
                Ok(delivery) => debug!(worker_id = %self.config.worker_id, ?delivery, "Message handled"),
                Err(e) if e.is_loop_level() => {
                    record_queue_error();
                    error!(
                        worker_id = %self.config.worker_id,
                        "Queue error, backing off for {:?}: {}", self.config.error_backoff, e
                    );
                    tokio::select! {
                        _ = shutdown_rx.changed() => {}
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
                Err(e) => {
                    warn!(worker_id = %self.config.worker_id, "Message handling ended with error: {}", e);
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Dequeue and handle at most one message.
    ///
    /// Queue connectivity errors surface as loop-level errors; everything
    /// that goes wrong with a single job is recorded against that job.
    pub async fn poll_once(&self) -> WorkerResult<Delivery> {
        let raw = match self
            .queue
            .dequeue(&self.config.queue_name, self.config.poll_timeout)
            .await
            .map_err(WorkerError::QueueUnavailable)?
        {
            Some(raw) => raw,
            None => return Ok(Delivery::Empty),
        };
        record_message_dequeued();

        match JobMessage::decode(&raw) {
            Ok(message) => self.process(message).await,
            Err(e) => {
                self.drop_message(&raw, &e).await;
                Ok(Delivery::Dropped)
            }
        }
    }

    async fn drop_message(&self, raw: &str, err: &QueueError) {
        warn!(
            worker_id = %self.config.worker_id,
            "Dropping undecodable message: {}", err
        );

        let mut dead_lettered = false;
        if let Some(dead_letter) = &self.config.dead_letter_queue {
            match self.queue.enqueue(dead_letter, raw).await {
                Ok(()) => dead_lettered = true,
                Err(e) => warn!(
                    queue = %dead_letter,
                    "Failed to dead-letter message: {}", e
                ),
            }
        }
        record_message_dropped(dead_lettered);
    }

    async fn process(&self, message: JobMessage) -> WorkerResult<Delivery> {
        let logger = JobLogger::new(&message.id, &message.video_id, &message.job_type);

        let job = match self
            .ctx
            .lifecycle
            .start(&message.id, &self.config.worker_id)
            .await
        {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(Delivery::Skipped(message.id)),
            Err(e) => {
                logger.log_error(&format!("Failed to start job: {}", e));
                return Err(e.into());
            }
        };

        let started = Instant::now();
        logger.log_start(&format!("picked up by {}", self.config.worker_id));

        let outcome: WorkerResult<()> = async {
            let task = message.task()?;
            tasks::execute(&self.ctx, &job, &task, &logger).await
        }
        .instrument(logger.create_span())
        .await;

        match outcome {
            Ok(()) => {
                record_job_completed(&message.job_type, started.elapsed());
                match self.ctx.lifecycle.complete(job).await {
                    Ok((job, video_status)) => {
                        logger.log_completion(&format!("video is {}", video_status));
                        Ok(Delivery::Completed(job))
                    }
                    Err(e) => {
                        logger.log_error(&format!("Failed to record completion: {}", e));
                        Err(e.into())
                    }
                }
            }
            Err(task_err) => {
                let reason = task_err.to_string();
                record_job_failed(&message.job_type, started.elapsed());
                logger.log_error(&reason);
                match self.ctx.lifecycle.fail(job, &reason).await {
                    Ok(job) => Ok(Delivery::Failed(job)),
                    Err(e) => {
                        logger.log_error(&format!("Failed to record failure: {}", e));
                        Err(e.into())
                    }
                }
            }
        }
    }
}
