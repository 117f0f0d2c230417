use bytes::Bytes;
use spool_blob::StagingStore;

use crate::{ChunkReceipt, JobContext, JobError, JobResult, JobStatus};

fn ensure_accepting(ctx: &JobContext) -> JobResult<()> {
    if ctx.is_cancelled() {
        return Err(JobError::Cancelled);
    }
    match ctx.status() {
        JobStatus::Uploading => Ok(()),
        status => Err(JobError::NotAcceptingChunks { status }),
    }
}

/// Store one chunk and record its arrival.
///
/// Suspends while the job is paused. A chunk index already received is
/// overwritten in staging without changing the received count. A write
/// that returns `Ok` is always part of the assembled file.
pub(crate) async fn receive(
    ctx: &JobContext,
    staging: &dyn StagingStore,
    index: u32,
    data: Bytes,
) -> JobResult<ChunkReceipt> {
    let total = ctx.total_chunks();
    if index >= total {
        return Err(JobError::IndexOutOfRange { index, total });
    }
    ensure_accepting(ctx)?;

    if ctx.is_paused() {
        tracing::debug!(job_id = %ctx.job_id(), index, "chunk waiting for resume");
        ctx.wait_while_paused().await?;
    }

    // Claim and cancel take the exclusive side, so the status seen here holds until the index is recorded.
    let _intake = ctx.intake_shared().await;
    ensure_accepting(ctx)?;

    let size = staging
        .write_chunk(ctx.job_id().as_str(), index, data)
        .await
        .map_err(|source| JobError::Storage { source })?;
    let received = ctx.record_chunk(index);

    tracing::debug!(job_id = %ctx.job_id(), index, size, received, total, "chunk stored");

    Ok(ChunkReceipt {
        index,
        size,
        received,
        total,
    })
}
