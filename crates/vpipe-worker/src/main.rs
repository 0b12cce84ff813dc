//! Video processing worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpipe_firestore::{FirestoreClient, FirestoreJobStore, FirestoreVideoStore};
use vpipe_media::{check_ffmpeg, FfmpegTranscoder};
use vpipe_queue::RedisQueue;
use vpipe_storage::{Buckets, S3Client};
use vpipe_worker::{JobExecutor, TaskContext, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vpipe=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vpipe-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid METRICS_ADDR: {}", addr))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics listening on {}", addr);
    }

    if let Err(e) = check_ffmpeg() {
        warn!("{}; every job will fail until it is installed", e);
    }

    let firestore = FirestoreClient::from_env().context("Failed to create Firestore client")?;
    let storage = S3Client::from_env().context("Failed to create object storage client")?;
    let buckets = Buckets::from_env();
    for bucket in [&buckets.videos, &buckets.thumbnails] {
        if let Err(e) = storage.check_bucket(bucket).await {
            warn!(bucket = %bucket, "Bucket check failed: {}", e);
        }
    }
    let queue = RedisQueue::from_env().context("Failed to create Redis queue")?;

    let ctx = TaskContext::new(
        Arc::new(FirestoreJobStore::new(firestore.clone())),
        Arc::new(FirestoreVideoStore::new(firestore)),
        Arc::new(storage),
        Arc::new(FfmpegTranscoder::from_env()),
        buckets,
        config.work_dir.clone(),
    );
    let shutdown_timeout = config.shutdown_timeout;
    let executor = Arc::new(JobExecutor::new(config, Arc::new(queue), ctx));

    let mut runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    tokio::select! {
        result = &mut runner => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Executor error: {}", e),
                Err(e) => error!("Executor task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            executor.shutdown();
            if tokio::time::timeout(shutdown_timeout, &mut runner).await.is_err() {
                warn!(
                    "In-flight job did not finish within {:?}, exiting",
                    shutdown_timeout
                );
            }
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
