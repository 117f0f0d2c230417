use bytes::Bytes;
use spool_blob::{BlobStore, StagingStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::assembler;
use crate::processor::StreamProcessor;
use crate::receiver;
use crate::upload;
use crate::{
    ChunkReceipt, CompleteReceipt, InitRequest, InitResponse, JobConfig, JobContext, JobError,
    JobId, JobRegistry, JobResult, JobSnapshot, JobStatus, LineHandler,
};

struct Inner {
    registry: Arc<JobRegistry>,
    staging: Arc<dyn StagingStore>,
    store: Arc<dyn BlobStore>,
    handler: Arc<dyn LineHandler>,
    config: JobConfig,
}

/// Control surface for chunked upload jobs.
///
/// Cheap to clone; clones share the same registry and stores.
#[derive(Clone)]
pub struct JobService {
    inner: Arc<Inner>,
}

impl JobService {
    pub fn new<S, B, H>(staging: S, store: B, handler: H, config: JobConfig) -> Self
    where
        S: StagingStore + 'static,
        B: BlobStore + 'static,
        H: LineHandler + 'static,
    {
        Self::from_parts(Arc::new(staging), Arc::new(store), Arc::new(handler), config)
    }

    pub fn from_parts(
        staging: Arc<dyn StagingStore>,
        store: Arc<dyn BlobStore>,
        handler: Arc<dyn LineHandler>,
        config: JobConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Arc::new(JobRegistry::new(&config)),
                staging,
                store,
                handler,
                config,
            }),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &JobConfig {
        &self.inner.config
    }

    /// Register a new job and prepare its staging area
    #[instrument(skip(self, request), fields(file_name = %request.file_name, total_chunks = request.total_chunks))]
    pub async fn init(&self, request: InitRequest) -> JobResult<InitResponse> {
        let ctx = self.inner.registry.create(request)?;

        if let Err(source) = self.inner.staging.prepare(ctx.job_id().as_str()).await {
            self.inner.registry.discard(ctx.job_id());
            return Err(JobError::Storage { source });
        }

        info!(job_id = %ctx.job_id(), "upload job created");
        Ok(InitResponse {
            job_id: ctx.job_id().clone(),
            status: ctx.status(),
            created_at: ctx.created_at(),
        })
    }

    #[instrument(skip(self, job_id, data), fields(job_id = %job_id, size = data.len()))]
    pub async fn upload_chunk(&self, job_id: &JobId, index: u32, data: Bytes) -> JobResult<ChunkReceipt> {
        let ctx = self.inner.registry.find(job_id)?;
        receiver::receive(&ctx, self.inner.staging.as_ref(), index, data).await
    }

    /// Assemble, upload and start processing.
    ///
    /// Returns once the file is stored; line processing continues in the background.
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub async fn complete(&self, job_id: &JobId) -> JobResult<CompleteReceipt> {
        let ctx = self.inner.registry.find(job_id)?;

        if ctx.is_cancelled() {
            self.retire_cancelled_upload(&ctx).await;
            return Err(JobError::Cancelled);
        }

        if let Err(e) = assembler::claim(&ctx).await {
            if matches!(e, JobError::Cancelled) {
                self.retire_cancelled_upload(&ctx).await;
            }
            return Err(e);
        }

        let assembled = match assembler::assemble(&ctx, self.inner.staging.as_ref()).await {
            Ok(assembled) => assembled,
            Err(JobError::Cancelled) => {
                ctx.set_status(JobStatus::Cancelled);
                self.finish_staging(&ctx).await;
                self.inner.registry.promote_to_completed(job_id);
                return Err(JobError::Cancelled);
            }
            Err(e) => return Err(self.abort(&ctx, e)),
        };

        let put = match upload::upload(self.inner.store.as_ref(), ctx.file_name(), &assembled.path).await {
            Ok(put) => put,
            Err(e) => return Err(self.abort(&ctx, e)),
        };

        if put.size_bytes != assembled.size_bytes {
            warn!(
                assembled = assembled.size_bytes,
                stored = put.size_bytes,
                "stored size differs from assembled size"
            );
        }

        if let Err(status) = ctx.mark_uploaded(put.etag.clone()) {
            warn!(%status, "job left ASSEMBLING during upload");
            return Err(JobError::AlreadyAssembling { status });
        }
        self.finish_staging(&ctx).await;

        StreamProcessor {
            ctx: ctx.clone(),
            store: self.inner.store.clone(),
            handler: self.inner.handler.clone(),
            registry: self.inner.registry.clone(),
            max_line_attempts: self.inner.config.max_line_attempts,
        }
        .spawn();

        Ok(CompleteReceipt {
            job_id: job_id.clone(),
            key: ctx.file_name().to_string(),
            size_bytes: put.size_bytes,
            etag: put.etag,
        })
    }

    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub fn pause(&self, job_id: &JobId) -> JobResult<JobStatus> {
        let ctx = self.inner.registry.find(job_id)?;
        if ctx.pause() {
            info!("pause requested");
        }
        Ok(ctx.status())
    }

    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub fn resume(&self, job_id: &JobId) -> JobResult<JobStatus> {
        let ctx = self.inner.registry.find(job_id)?;
        if ctx.resume() {
            info!("resume requested");
        }
        Ok(ctx.status())
    }

    /// Latch cancellation. A job still accepting chunks is retired at once;
    /// later stages stop at their next boundary.
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub async fn cancel(&self, job_id: &JobId) -> JobResult<JobStatus> {
        let ctx = self.inner.registry.find(job_id)?;
        ctx.cancel();
        info!("cancel requested");
        self.retire_cancelled_upload(&ctx).await;
        Ok(ctx.status())
    }

    pub fn status(&self, job_id: &JobId) -> JobResult<JobStatus> {
        Ok(self.inner.registry.find(job_id)?.status())
    }

    pub fn snapshot(&self, job_id: &JobId) -> JobResult<JobSnapshot> {
        Ok(self.inner.registry.find(job_id)?.snapshot())
    }

    /// Subscribe to a job's status transitions
    pub fn watch(&self, job_id: &JobId) -> JobResult<watch::Receiver<JobStatus>> {
        Ok(self.inner.registry.find(job_id)?.subscribe())
    }

    /// Direct handle on a job's shared state
    pub fn context(&self, job_id: &JobId) -> JobResult<Arc<JobContext>> {
        self.inner.registry.find(job_id)
    }

    /// Mark the job failed, keep its staging for inspection and retire it
    fn abort(&self, ctx: &JobContext, cause: JobError) -> JobError {
        error!(error = %cause, "job failed");
        ctx.fail(cause.to_string());
        self.inner.registry.promote_to_completed(ctx.job_id());
        cause
    }

    /// `UPLOADING -> CANCELLED` once no chunk write is in flight, then clean up
    /// and retire. No-op if the job already left `UPLOADING`.
    async fn retire_cancelled_upload(&self, ctx: &JobContext) {
        let retired = {
            let _intake = ctx.intake_exclusive().await;
            ctx.compare_and_set(JobStatus::Uploading, JobStatus::Cancelled).is_ok()
        };
        if retired {
            info!("upload cancelled before assembly");
            self.finish_staging(ctx).await;
            self.inner.registry.promote_to_completed(ctx.job_id());
        }
    }

    /// Remove staged chunks unless configured to keep them
    async fn finish_staging(&self, ctx: &JobContext) {
        if self.inner.config.retain_staging {
            return;
        }
        if let Err(e) = self.inner.staging.delete(ctx.job_id().as_str()).await {
            warn!(error = %e, "failed to clean up staging");
        }
    }
}

impl std::fmt::Debug for JobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobService")
            .field("active_jobs", &self.inner.registry.active_len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
