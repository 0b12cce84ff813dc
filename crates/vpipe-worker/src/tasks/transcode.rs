use vpipe_models::{Job, Quality, VideoFormat};
use vpipe_storage::{processed_filename, processed_key, upload_file, VIDEO_MP4};

use super::TaskContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

pub(super) async fn run(
    ctx: &TaskContext,
    job: &Job,
    quality: &Quality,
    logger: &JobLogger,
) -> WorkerResult<()> {
    let video = ctx.videos.get_by_id(&job.video_id).await?;
    let scratch = ctx.scratch(job).await?;

    ctx.milestone(job, logger, 10, "downloading original").await;
    let input = ctx.fetch_original(&video, scratch.path()).await?;

    ctx.milestone(job, logger, 30, &format!("transcoding to {}", quality))
        .await;
    let filename = processed_filename(&video.id, quality);
    let output = scratch.path().join(&filename);
    ctx.transcoder
        .transcode(&input, &output, &quality.profile())
        .await
        .map_err(|e| WorkerError::processing_failed(e.to_string()))?;

    ctx.milestone(job, logger, 80, "uploading rendition").await;
    let size = upload_file(
        ctx.storage.as_ref(),
        &ctx.buckets.videos,
        &processed_key(&video.id, quality),
        &output,
        VIDEO_MP4,
    )
    .await
    .map_err(|e| WorkerError::upload_failed(e.to_string()))?;

    ctx.videos
        .append_format(
            &video.id,
            &VideoFormat {
                quality: quality.as_str().to_string(),
                filename,
                size,
            },
        )
        .await?;

    logger.log_progress(100, &format!("{} rendition stored ({} bytes)", quality, size));
    Ok(())
}
