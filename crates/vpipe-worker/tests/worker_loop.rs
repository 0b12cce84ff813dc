//! Poll loop behavior: message handling edge cases, back-off and shutdown.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{Harness, ScriptedTranscoder};
use vpipe_models::{Job, JobStatus, JobTask, NewVideo, Video, VideoStatus};
use vpipe_queue::{JobMessage, QueueError, QueueResult, WorkQueue, VIDEO_JOBS_QUEUE};
use vpipe_store::{JobStore, VideoStore};
use vpipe_worker::{Delivery, WorkerError};

/// Queue whose every dequeue fails as if Redis were unreachable.
#[derive(Default)]
struct UnreachableQueue {
    dequeues: AtomicUsize,
}

#[async_trait]
impl WorkQueue for UnreachableQueue {
    async fn enqueue(&self, _queue: &str, _message: &str) -> QueueResult<()> {
        Err(QueueError::connection_failed("connection refused"))
    }

    async fn dequeue(&self, _queue: &str, _timeout: Duration) -> QueueResult<Option<String>> {
        self.dequeues.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::connection_failed("connection refused"))
    }
}

/// A processing video with one pending thumbnail job, created directly in
/// the stores so nothing is enqueued.
async fn pending_job(h: &Harness) -> (Video, Job) {
    let video = Video::new(NewVideo {
        title: "Manual".to_string(),
        original_filename: "manual.mp4".to_string(),
        size: 1,
        ..Default::default()
    })
    .with_status(VideoStatus::Processing, None);
    h.videos.create(&video).await.unwrap();

    let job = Job::new(video.id.clone(), JobTask::Thumbnail);
    h.jobs.create(&job).await.unwrap();
    (video, job)
}

async fn enqueue_raw(h: &Harness, raw: &str) {
    h.queue.enqueue(VIDEO_JOBS_QUEUE, raw).await.unwrap();
}

#[tokio::test]
async fn test_empty_queue_is_not_an_error() {
    let h = Harness::new(ScriptedTranscoder::new());
    let delivery = h.worker("worker-1").poll_once().await.unwrap();
    assert_eq!(delivery, Delivery::Empty);
}

#[tokio::test]
async fn test_unknown_job_type_fails_without_storage_io() {
    let h = Harness::new(ScriptedTranscoder::new());
    let (video, job) = pending_job(&h).await;

    let mut message = JobMessage::for_job(&job);
    message.job_type = "watermark".to_string();
    enqueue_raw(&h, &message.encode().unwrap()).await;

    let delivery = h.worker("worker-1").poll_once().await.unwrap();
    let failed = match delivery {
        Delivery::Failed(job) => job,
        other => panic!("unexpected delivery {other:?}"),
    };
    assert_eq!(failed.id, job.id);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("unknown job type: watermark")
    );

    assert_eq!(h.storage.operation_count(), 0);
    assert_eq!(h.transcoder.calls(), 0);

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert_eq!(
        video.error_message.as_deref(),
        Some("unknown job type: watermark")
    );
}

#[tokio::test]
async fn test_transcode_without_quality_fails() {
    let h = Harness::new(ScriptedTranscoder::new());
    let (_, job) = pending_job(&h).await;
    let raw = format!(
        r#"{{"id":"{}","video_id":"{}","type":"transcode","payload":{{}}}}"#,
        job.id, job.video_id
    );
    enqueue_raw(&h, &raw).await;

    match h.worker("worker-1").poll_once().await.unwrap() {
        Delivery::Failed(job) => {
            assert!(job.error_message.unwrap().contains("missing a quality"));
        }
        other => panic!("unexpected delivery {other:?}"),
    }
    assert_eq!(h.storage.operation_count(), 0);
}

#[tokio::test]
async fn test_malformed_message_is_dropped() {
    let h = Harness::new(ScriptedTranscoder::new());
    enqueue_raw(&h, "{not json").await;
    enqueue_raw(&h, r#"{"id":"","video_id":"v","type":"thumbnail"}"#).await;

    let worker = h.worker("worker-1");
    assert_eq!(worker.poll_once().await.unwrap(), Delivery::Dropped);
    assert_eq!(worker.poll_once().await.unwrap(), Delivery::Dropped);
    assert_eq!(worker.poll_once().await.unwrap(), Delivery::Empty);

    assert_eq!(h.jobs.write_count(), 0);
    assert_eq!(h.videos.write_count(), 0);
}

#[tokio::test]
async fn test_malformed_message_goes_to_dead_letter_list() {
    let h = Harness::new(ScriptedTranscoder::new());
    enqueue_raw(&h, "{not json").await;

    let mut config = h.config("worker-1");
    config.dead_letter_queue = Some("video_jobs_dead".to_string());
    let worker = h.worker_with(config, h.queue.clone());

    assert_eq!(worker.poll_once().await.unwrap(), Delivery::Dropped);
    assert_eq!(h.queue.peek_all("video_jobs_dead"), vec!["{not json"]);
    assert!(h.queue.is_empty(VIDEO_JOBS_QUEUE));
}

#[tokio::test]
async fn test_message_for_started_job_is_skipped() {
    let h = Harness::new(ScriptedTranscoder::new());
    let (_, job) = pending_job(&h).await;
    let raw = JobMessage::for_job(&job).encode().unwrap();
    enqueue_raw(&h, &raw).await;
    enqueue_raw(&h, &raw).await;

    let worker = h.worker("worker-1");
    // original is missing, so the first delivery fails the job
    assert!(matches!(worker.poll_once().await.unwrap(), Delivery::Failed(_)));
    let writes = h.jobs.write_count();

    assert_eq!(
        worker.poll_once().await.unwrap(),
        Delivery::Skipped(job.id.clone())
    );
    assert_eq!(h.jobs.write_count(), writes);
    assert_eq!(
        h.jobs.get_by_id(&job.id).await.unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn test_message_for_missing_job_is_a_job_error() {
    let h = Harness::new(ScriptedTranscoder::new());
    enqueue_raw(
        &h,
        r#"{"id":"ghost","video_id":"v","type":"thumbnail","payload":{}}"#,
    )
    .await;

    let err = h.worker("worker-1").poll_once().await.unwrap_err();
    assert!(!err.is_loop_level());
    assert!(matches!(err, WorkerError::Pipeline(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn test_queue_outage_is_loop_level() {
    let h = Harness::new(ScriptedTranscoder::new());
    let (_, job) = pending_job(&h).await;
    let worker = h.worker_with(h.config("worker-1"), Arc::new(UnreachableQueue::default()));

    let err = worker.poll_once().await.unwrap_err();
    assert!(err.is_loop_level());
    assert_eq!(
        h.jobs.get_by_id(&job.id).await.unwrap().status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn test_run_backs_off_and_stops_on_shutdown() {
    let h = Harness::new(ScriptedTranscoder::new());
    let queue = Arc::new(UnreachableQueue::default());
    let worker = Arc::new(h.worker_with(h.config("worker-1"), queue.clone()));

    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.shutdown();
    assert!(worker.is_shutting_down());

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let polls = queue.dequeues.load(Ordering::SeqCst);
    assert!(polls >= 2, "expected repeated polls, got {polls}");
}

#[tokio::test]
async fn test_run_finishes_queued_work_then_stops() {
    let h = Harness::new(ScriptedTranscoder::new());
    let video = h.upload("holiday.mp4").await;
    let worker = Arc::new(h.worker("worker-1"));

    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = h.videos.get_by_id(&video.id).await.unwrap().status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map(|status| assert_eq!(status, VideoStatus::Ready))
    .unwrap();

    worker.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
