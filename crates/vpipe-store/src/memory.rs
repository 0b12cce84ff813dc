//! In-memory stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use vpipe_models::{Job, JobId, JobStatus, Video, VideoFormat, VideoId, VideoStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::{JobStore, VideoStore};

/// Switch shared by the memory stores to simulate an outage.
#[derive(Default)]
struct Availability {
    down: AtomicBool,
    writes: AtomicUsize,
}

impl Availability {
    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("store is offline"));
        }
        Ok(())
    }

    fn write(&self) -> StoreResult<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable("store lock poisoned")
}

/// Job store held in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    availability: Availability,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, down: bool) {
        self.availability.down.store(down, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.availability.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        self.availability.check()?;
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::already_exists(format!("job {}", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        self.availability.write()
    }

    async fn get_by_id(&self, id: &JobId) -> StoreResult<Job> {
        self.availability.check()?;
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("job {}", id)))
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        self.availability.check()?;
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                self.availability.write()
            }
            None => Err(StoreError::not_found(format!("job {}", job.id))),
        }
    }

    async fn get_by_video_id(&self, video_id: &VideoId) -> StoreResult<Vec<Job>> {
        self.availability.check()?;
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        Ok(jobs
            .values()
            .filter(|j| &j.video_id == video_id)
            .cloned()
            .collect())
    }

    async fn get_pending_jobs(&self, limit: usize) -> StoreResult<Vec<Job>> {
        self.availability.check()?;
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        let mut pending: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn get_active_jobs(&self) -> StoreResult<Vec<Job>> {
        self.availability.check()?;
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        Ok(jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .cloned()
            .collect())
    }

    async fn update_progress(&self, id: &JobId, progress: u8) -> StoreResult<()> {
        self.availability.check()?;
        vpipe_models::validate_progress(i64::from(progress))?;
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("job {}", id)))?;
        job.progress = progress;
        job.updated_at = Utc::now();
        self.availability.write()
    }
}

/// Video store held in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryVideoStore {
    videos: Mutex<HashMap<VideoId, Video>>,
    availability: Availability,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.availability.down.store(down, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.availability.writes.load(Ordering::SeqCst)
    }

    fn modify(&self, id: &VideoId, f: impl FnOnce(&mut Video)) -> StoreResult<()> {
        self.availability.check()?;
        let mut videos = self.videos.lock().map_err(|_| poisoned())?;
        let video = videos
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;
        f(video);
        self.availability.write()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create(&self, video: &Video) -> StoreResult<()> {
        self.availability.check()?;
        let mut videos = self.videos.lock().map_err(|_| poisoned())?;
        if videos.contains_key(&video.id) {
            return Err(StoreError::already_exists(format!("video {}", video.id)));
        }
        videos.insert(video.id.clone(), video.clone());
        self.availability.write()
    }

    async fn get_by_id(&self, id: &VideoId) -> StoreResult<Video> {
        self.availability.check()?;
        let videos = self.videos.lock().map_err(|_| poisoned())?;
        videos
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))
    }

    async fn update(&self, video: &Video) -> StoreResult<()> {
        self.modify(&video.id, |slot| *slot = video.clone())
    }

    async fn set_status(
        &self,
        id: &VideoId,
        status: VideoStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        self.modify(id, |video| {
            video.status = status;
            if let Some(msg) = error_message {
                video.error_message = Some(msg.to_string());
            }
            video.updated_at = Utc::now();
        })
    }

    async fn append_format(&self, id: &VideoId, format: &VideoFormat) -> StoreResult<()> {
        self.modify(id, |video| video.add_format(format.clone()))
    }

    async fn append_thumbnail(&self, id: &VideoId, filename: &str) -> StoreResult<()> {
        self.modify(id, |video| video.add_thumbnail(filename))
    }

    async fn list_by_status(&self, status: VideoStatus) -> StoreResult<Vec<Video>> {
        self.availability.check()?;
        let videos = self.videos.lock().map_err(|_| poisoned())?;
        Ok(videos
            .values()
            .filter(|v| v.status == status)
            .cloned()
            .collect())
    }
}
