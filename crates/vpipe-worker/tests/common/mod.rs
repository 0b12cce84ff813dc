#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Barrier;

use vpipe_media::{MediaError, MediaResult, Transcoder};
use vpipe_models::{Job, JobId, JobStatus, NewVideo, QualityProfile, Video, VideoId};
use vpipe_pipeline::{FanoutScheduler, VideoService};
use vpipe_queue::{JobPublisher, MemoryQueue, WorkQueue, VIDEO_JOBS_QUEUE};
use vpipe_storage::{original_key, Buckets, MemoryObjectStore, VIDEO_MP4};
use vpipe_store::{JobStore, MemoryJobStore, MemoryVideoStore, StoreResult};
use vpipe_worker::{Delivery, JobExecutor, TaskContext, WorkerConfig};

/// Transcoder double that writes small placeholder artifacts, or fails when
/// the output file name contains a configured marker.
#[derive(Default)]
pub struct ScriptedTranscoder {
    fail_marker: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, output: &Path) -> MediaResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = output.to_string_lossy();
        match &self.fail_marker {
            Some(marker) if name.contains(marker.as_str()) => Err(MediaError::ffmpeg_failed(
                Some("Conversion failed!".to_string()),
                Some(1),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &QualityProfile,
    ) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.check(output)?;
        tokio::fs::write(output, format!("rendition:{}", profile.scale_height)).await?;
        Ok(())
    }

    async fn extract_thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.check(output)?;
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }
}

/// Job store that, once armed, holds every `completed` write until
/// `parties` of them have landed.
pub struct CompletionGate {
    inner: Arc<MemoryJobStore>,
    barrier: Barrier,
    armed: AtomicBool,
    released: AtomicUsize,
}

impl CompletionGate {
    pub fn new(inner: Arc<MemoryJobStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            armed: AtomicBool::new(false),
            released: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Completed writes that passed the barrier.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for CompletionGate {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        self.inner.create(job).await
    }

    async fn get_by_id(&self, id: &JobId) -> StoreResult<Job> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        self.inner.update(job).await?;
        if job.status == JobStatus::Completed && self.armed.load(Ordering::SeqCst) {
            self.barrier.wait().await;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn get_by_video_id(&self, video_id: &VideoId) -> StoreResult<Vec<Job>> {
        self.inner.get_by_video_id(video_id).await
    }

    async fn get_pending_jobs(&self, limit: usize) -> StoreResult<Vec<Job>> {
        self.inner.get_pending_jobs(limit).await
    }

    async fn get_active_jobs(&self) -> StoreResult<Vec<Job>> {
        self.inner.get_active_jobs().await
    }

    async fn update_progress(&self, id: &JobId, progress: u8) -> StoreResult<()> {
        self.inner.update_progress(id, progress).await
    }
}

/// In-memory pipeline: queue, stores, object storage and a scripted tool.
pub struct Harness {
    pub jobs: Arc<MemoryJobStore>,
    pub videos: Arc<MemoryVideoStore>,
    pub queue: Arc<MemoryQueue>,
    pub storage: Arc<MemoryObjectStore>,
    pub transcoder: Arc<ScriptedTranscoder>,
    pub service: VideoService,
    pub buckets: Buckets,
    pub work_dir: TempDir,
}

impl Harness {
    pub fn new(transcoder: ScriptedTranscoder) -> Self {
        let jobs = Arc::new(MemoryJobStore::new());
        let videos = Arc::new(MemoryVideoStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let scheduler = FanoutScheduler::new(
            jobs.clone(),
            videos.clone(),
            JobPublisher::new(queue.clone(), VIDEO_JOBS_QUEUE),
        );

        Self {
            service: VideoService::new(videos.clone(), scheduler),
            jobs,
            videos,
            queue,
            storage: Arc::new(MemoryObjectStore::new()),
            transcoder: Arc::new(transcoder),
            buckets: Buckets::default(),
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn config(&self, worker_id: &str) -> WorkerConfig {
        WorkerConfig {
            worker_id: worker_id.to_string(),
            poll_timeout: Duration::from_millis(50),
            error_backoff: Duration::from_millis(10),
            work_dir: self.work_dir.path().to_path_buf(),
            ..WorkerConfig::default()
        }
    }

    pub fn worker(&self, worker_id: &str) -> JobExecutor {
        self.worker_with(self.config(worker_id), self.queue.clone())
    }

    pub fn worker_with(&self, config: WorkerConfig, queue: Arc<dyn WorkQueue>) -> JobExecutor {
        self.worker_over(config, queue, self.jobs.clone())
    }

    /// Worker whose job writes go through `jobs` instead of the shared store.
    pub fn worker_over(
        &self,
        config: WorkerConfig,
        queue: Arc<dyn WorkQueue>,
        jobs: Arc<dyn JobStore>,
    ) -> JobExecutor {
        let ctx = TaskContext::new(
            jobs,
            self.videos.clone(),
            self.storage.clone(),
            self.transcoder.clone(),
            self.buckets.clone(),
            config.work_dir.clone(),
        );
        JobExecutor::new(config, queue, ctx)
    }

    /// Store an original in object storage, then register it.
    pub async fn upload(&self, filename: &str) -> Video {
        let upload = NewVideo {
            title: format!("Upload {}", filename),
            uploaded_by: "user-1".to_string(),
            original_filename: filename.to_string(),
            size: 1024,
            duration: Some(3.0),
            ..Default::default()
        };
        let video = self.service.register_upload(upload).await.unwrap();
        self.storage.insert(
            &self.buckets.videos,
            &original_key(&video.id, &video.original_extension()),
            vec![0u8; 1024],
            VIDEO_MP4,
        );
        video
    }

    /// Register an upload without placing its original in storage.
    pub async fn upload_without_original(&self, filename: &str) -> Video {
        let upload = NewVideo {
            title: "No original".to_string(),
            original_filename: filename.to_string(),
            size: 10,
            ..Default::default()
        };
        self.service.register_upload(upload).await.unwrap()
    }
}

/// Poll until the queue is drained, returning every non-empty delivery.
pub async fn drain(worker: &JobExecutor) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    loop {
        match worker.poll_once().await.unwrap() {
            Delivery::Empty => return deliveries,
            delivery => deliveries.push(delivery),
        }
    }
}

pub fn completed(deliveries: &[Delivery]) -> Vec<Job> {
    deliveries
        .iter()
        .filter_map(|d| match d {
            Delivery::Completed(job) => Some(job.clone()),
            _ => None,
        })
        .collect()
}

pub fn failed(deliveries: &[Delivery]) -> Vec<Job> {
    deliveries
        .iter()
        .filter_map(|d| match d {
            Delivery::Failed(job) => Some(job.clone()),
            _ => None,
        })
        .collect()
}
