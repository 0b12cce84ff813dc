//! Fan out processing jobs for an already-registered video.
//!
//! Usage: `vpipe-schedule <video_id>`

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpipe_firestore::{FirestoreClient, FirestoreJobStore, FirestoreVideoStore};
use vpipe_models::VideoId;
use vpipe_pipeline::FanoutScheduler;
use vpipe_queue::{JobPublisher, QueueConfig, RedisQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env().add_directive("vpipe=info".parse()?))
        .init();

    let video_id = std::env::args()
        .nth(1)
        .map(VideoId::from_string)
        .context("usage: vpipe-schedule <video_id>")?;

    let firestore = FirestoreClient::from_env().context("Failed to create Firestore client")?;
    let queue_config = QueueConfig::from_env();
    let queue = RedisQueue::new(&queue_config).context("Failed to create Redis queue")?;

    let scheduler = FanoutScheduler::new(
        Arc::new(FirestoreJobStore::new(firestore.clone())),
        Arc::new(FirestoreVideoStore::new(firestore)),
        JobPublisher::new(Arc::new(queue), queue_config.queue_name.clone()),
    );

    let jobs = scheduler.schedule(&video_id).await?;
    for job in &jobs {
        info!(job_id = %job.id, job_type = %job.job_type(), "Scheduled");
        println!("{}", job.id);
    }

    Ok(())
}
