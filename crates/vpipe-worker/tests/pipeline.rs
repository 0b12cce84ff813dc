//! End-to-end runs of upload, fan-out and workers over in-memory backends.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{completed, drain, failed, CompletionGate, Harness, ScriptedTranscoder};
use vpipe_models::{JobStatus, JobTask, VideoStatus};
use vpipe_storage::{processed_key, thumbnail_key};
use vpipe_store::{JobStore, VideoStore};
use vpipe_worker::Delivery;

#[tokio::test]
async fn test_all_jobs_complete_marks_video_ready() {
    let h = Harness::new(ScriptedTranscoder::new());
    let video = h.upload("holiday.mp4").await;
    assert_eq!(video.status, VideoStatus::Processing);

    let deliveries = drain(&h.worker("worker-1")).await;
    assert_eq!(completed(&deliveries).len(), 4);

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Ready);
    assert_eq!(video.error_message, None);
    assert_eq!(video.formats.len(), 3);
    assert_eq!(video.thumbnails, vec![thumbnail_key(&video.id)]);

    let mut qualities: Vec<_> = video.formats.iter().map(|f| f.quality.clone()).collect();
    qualities.sort();
    assert_eq!(qualities, vec!["1080p", "480p", "720p"]);

    for format in &video.formats {
        let key = format!("videos/processed/{}", format.filename);
        let (data, content_type) = h.storage.object("videos", &key).unwrap();
        assert_eq!(data.len() as u64, format.size);
        assert_eq!(content_type, "video/mp4");
    }
    let (_, content_type) = h
        .storage
        .object("thumbnails", &thumbnail_key(&video.id))
        .unwrap();
    assert_eq!(content_type, "image/jpeg");

    for job in h.jobs.get_by_video_id(&video.id).await.unwrap() {
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.worker_id.as_deref(), Some("worker-1"));
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
    }
}

#[tokio::test]
async fn test_1080p_rendition_uses_720p_scaling() {
    let h = Harness::new(ScriptedTranscoder::new());
    let video = h.upload("clip.mov").await;
    drain(&h.worker("worker-1")).await;

    let read = |quality: &str| {
        let key = processed_key(&video.id, &quality.into());
        String::from_utf8(h.storage.object("videos", &key).unwrap().0).unwrap()
    };
    assert_eq!(read("480p"), "rendition:480");
    assert_eq!(read("720p"), "rendition:720");
    assert_eq!(read("1080p"), "rendition:720");
}

#[tokio::test]
async fn test_one_failed_transcode_fails_video() {
    let h = Harness::new(ScriptedTranscoder::failing_on("_1080p"));
    let video = h.upload("holiday.mp4").await;

    let deliveries = drain(&h.worker("worker-1")).await;
    assert_eq!(completed(&deliveries).len(), 3);
    let failures = failed(&deliveries);
    assert_eq!(failures.len(), 1);

    let failed_job = h.jobs.get_by_id(&failures[0].id).await.unwrap();
    assert_eq!(failed_job.status, JobStatus::Failed);
    assert!(failed_job.completed_at.is_some());
    let message = failed_job.error_message.unwrap();
    assert!(message.contains("exited with status 1"), "{message}");

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert_eq!(video.error_message.as_deref(), Some(message.as_str()));
}

#[tokio::test]
async fn test_early_failure_is_not_overturned_by_later_completions() {
    let h = Harness::new(ScriptedTranscoder::failing_on("_480p"));
    let video = h.upload("holiday.mp4").await;

    let deliveries = drain(&h.worker("worker-1")).await;
    assert_eq!(failed(&deliveries).len(), 1);
    assert_eq!(completed(&deliveries).len(), 3);

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    // completed siblings still record their artifacts
    assert_eq!(video.formats.len(), 2);
    assert_eq!(video.thumbnails.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_final_completions_converge_on_ready() {
    let h = Arc::new(Harness::new(ScriptedTranscoder::new()));
    let video = h.upload("holiday.mp4").await;

    let first = h.worker("worker-1");
    for _ in 0..2 {
        assert!(matches!(
            first.poll_once().await.unwrap(),
            Delivery::Completed(_)
        ));
    }

    // both final jobs are recorded completed before either re-scan runs
    let gate = Arc::new(CompletionGate::new(h.jobs.clone(), 2));
    gate.arm();
    let a = Arc::new(h.worker_over(h.config("worker-a"), h.queue.clone(), gate.clone()));
    let b = Arc::new(h.worker_over(h.config("worker-b"), h.queue.clone(), gate.clone()));

    let (ra, rb) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            tokio::spawn({
                let a = a.clone();
                async move { a.poll_once().await }
            }),
            tokio::spawn({
                let b = b.clone();
                async move { b.poll_once().await }
            }),
        )
    })
    .await
    .expect("final completions never met at the gate");
    assert!(matches!(ra.unwrap().unwrap(), Delivery::Completed(_)));
    assert!(matches!(rb.unwrap().unwrap(), Delivery::Completed(_)));
    assert_eq!(gate.released(), 2);

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Ready);
    assert_eq!(video.error_message, None);
    assert_eq!(video.formats.len(), 3);
    assert_eq!(video.thumbnails.len(), 1);

    let owners: HashSet<_> = h
        .jobs
        .get_by_video_id(&video.id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|j| j.worker_id)
        .collect();
    assert!(owners.contains("worker-1"));
    assert!(owners.contains("worker-a"));
    assert!(owners.contains("worker-b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_message_processed_by_exactly_one_worker() {
    let h = Arc::new(Harness::new(ScriptedTranscoder::new()));
    let mut videos = Vec::new();
    for i in 0..5 {
        videos.push(h.upload(&format!("clip-{i}.mp4")).await);
    }

    let mut handles = Vec::new();
    for i in 0..3 {
        let worker = h.worker(&format!("worker-{i}"));
        handles.push(tokio::spawn(async move { drain(&worker).await }));
    }

    let mut seen = Vec::new();
    for handle in handles {
        let deliveries = handle.await.unwrap();
        assert!(deliveries
            .iter()
            .all(|d| matches!(d, Delivery::Completed(_))));
        seen.extend(completed(&deliveries).into_iter().map(|j| j.id));
    }

    let unique: HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), 20);
    assert_eq!(unique.len(), 20);
    assert_eq!(h.transcoder.calls(), 20);

    for video in videos {
        let video = h.videos.get_by_id(&video.id).await.unwrap();
        assert_eq!(video.status, VideoStatus::Ready);
    }
}

#[tokio::test]
async fn test_missing_original_fails_with_download_error() {
    let h = Harness::new(ScriptedTranscoder::new());
    let video = h.upload_without_original("lost.mp4").await;

    let deliveries = drain(&h.worker("worker-1")).await;
    assert_eq!(failed(&deliveries).len(), 4);
    assert_eq!(h.transcoder.calls(), 0);

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(video
        .error_message
        .unwrap()
        .starts_with("Download failed"));
}

#[tokio::test]
async fn test_upload_failure_fails_job() {
    let h = Harness::new(ScriptedTranscoder::new());
    let video = h.upload("holiday.mp4").await;
    h.storage.set_fail_uploads(true);

    let worker = h.worker("worker-1");
    let delivery = worker.poll_once().await.unwrap();
    let job = match delivery {
        Delivery::Failed(job) => job,
        other => panic!("unexpected delivery {other:?}"),
    };
    assert_eq!(job.task, JobTask::Thumbnail);
    assert!(job.error_message.unwrap().starts_with("Upload failed"));

    let video = h.videos.get_by_id(&video.id).await.unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(video.thumbnails.is_empty());
}

#[tokio::test]
async fn test_scratch_space_removed_after_each_job() {
    let h = Harness::new(ScriptedTranscoder::failing_on("_720p"));
    h.upload("holiday.mp4").await;

    drain(&h.worker("worker-1")).await;

    let leftovers = std::fs::read_dir(h.work_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}
