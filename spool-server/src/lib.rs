pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use spool_axum::SpoolApp;
use spool_blob::{BlobStore, FsBlobStore, FsStagingStore, MemoryBlobStore, S3CompatibleStore};
use spool_jobs::{JobService, TracingLineHandler};

use crate::config::{BlobBackend, ServerConfig};

async fn blob_store(config: &ServerConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.blob_backend()? {
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
        BlobBackend::Fs => {
            let dir = config.blob_dir();
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating blob dir {}", dir.display()))?;
            Arc::new(FsBlobStore::new(dir))
        }
        BlobBackend::S3 => Arc::new(S3CompatibleStore::new(config.s3_config()?).await?),
    };
    Ok(store)
}

/// Wire stores, job service and HTTP routes from configuration
pub async fn build(config: &ServerConfig) -> Result<SpoolApp> {
    let staging_dir = config.staging_dir();
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .with_context(|| format!("creating staging dir {}", staging_dir.display()))?;

    let backend = config.blob_backend()?;
    let store = blob_store(config).await?;
    tracing::info!(?backend, staging = %staging_dir.display(), "storage configured");

    let jobs = JobService::from_parts(
        Arc::new(FsStagingStore::new(staging_dir)),
        store,
        Arc::new(TracingLineHandler),
        config.job_config()?,
    );

    let app = SpoolApp::with_body_limit(jobs, config.max_chunk_bytes()?)
        .use_router("/health", Router::new().route("/", get(|| async { "ok" })));
    Ok(app)
}
