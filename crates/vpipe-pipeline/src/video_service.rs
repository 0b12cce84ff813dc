//! Upload registration.

use std::sync::Arc;

use tracing::info;

use vpipe_models::{NewVideo, Video};
use vpipe_store::VideoStore;

use crate::error::PipelineResult;
use crate::metrics::record_upload_registered;
use crate::scheduler::FanoutScheduler;

/// Records new uploads and hands them to the scheduler.
#[derive(Clone)]
pub struct VideoService {
    videos: Arc<dyn VideoStore>,
    scheduler: FanoutScheduler,
}

impl VideoService {
    pub fn new(videos: Arc<dyn VideoStore>, scheduler: FanoutScheduler) -> Self {
        Self { videos, scheduler }
    }

    /// Validate an upload, create its video in `uploaded`, then fan out.
    ///
    /// The original must already be stored under
    /// `videos/original/{id}{ext}`; nothing here touches object storage.
    pub async fn register_upload(&self, upload: NewVideo) -> PipelineResult<Video> {
        upload.validate()?;

        let video = Video::new(upload);
        self.videos.create(&video).await?;
        info!(
            video_id = %video.id,
            filename = %video.original_filename,
            size = video.size,
            "Registered upload"
        );
        record_upload_registered();

        self.scheduler.schedule(&video.id).await?;
        Ok(self.videos.get_by_id(&video.id).await?)
    }
}
