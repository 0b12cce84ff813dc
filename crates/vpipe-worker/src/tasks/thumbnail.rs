use vpipe_models::Job;
use vpipe_storage::{thumbnail_key, upload_file, IMAGE_JPEG};

use super::TaskContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

pub(super) async fn run(ctx: &TaskContext, job: &Job, logger: &JobLogger) -> WorkerResult<()> {
    let video = ctx.videos.get_by_id(&job.video_id).await?;
    let scratch = ctx.scratch(job).await?;

    ctx.milestone(job, logger, 20, "downloading original").await;
    let input = ctx.fetch_original(&video, scratch.path()).await?;

    ctx.milestone(job, logger, 50, "extracting frame").await;
    let filename = thumbnail_key(&video.id);
    let output = scratch.path().join(&filename);
    ctx.transcoder
        .extract_thumbnail(&input, &output)
        .await
        .map_err(|e| WorkerError::processing_failed(e.to_string()))?;

    ctx.milestone(job, logger, 80, "uploading thumbnail").await;
    upload_file(
        ctx.storage.as_ref(),
        &ctx.buckets.thumbnails,
        &filename,
        &output,
        IMAGE_JPEG,
    )
    .await
    .map_err(|e| WorkerError::upload_failed(e.to_string()))?;

    ctx.videos.append_thumbnail(&video.id, &filename).await?;
    Ok(())
}
