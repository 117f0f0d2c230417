use futures::StreamExt;
use spool_blob::{BlobError, StagingStore};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::{JobContext, JobError, JobResult, JobStatus};

/// Merged file ready for upload
#[derive(Debug)]
pub(crate) struct Assembled {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Check completeness and claim the job for assembly.
///
/// Waits for in-flight chunk writes to finish. Exactly one caller wins the
/// `UPLOADING -> ASSEMBLING` transition; the others get `AlreadyAssembling`
/// with the status they observed.
pub(crate) async fn claim(ctx: &JobContext) -> JobResult<()> {
    let _intake = ctx.intake_exclusive().await;
    if ctx.is_cancelled() {
        return Err(JobError::Cancelled);
    }

    let received = ctx.received_count();
    let total = ctx.total_chunks();
    if received != total {
        return Err(JobError::IncompleteUpload { received, total });
    }

    ctx.compare_and_set(JobStatus::Uploading, JobStatus::Assembling)
        .map_err(|status| JobError::AlreadyAssembling { status })
}

/// Concatenate staged chunks `0..total` into the job's merge file.
///
/// Waits out a pause and checks cancellation before every chunk. Returns `Cancelled` or
/// `AssemblyFailed`; the caller owns the status transition.
pub(crate) async fn assemble(ctx: &JobContext, staging: &dyn StagingStore) -> JobResult<Assembled> {
    let job_id = ctx.job_id().as_str();
    let failed = |source: BlobError| JobError::AssemblyFailed { source };

    let path = staging.merge_path(job_id).map_err(failed)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| failed(e.into()))?;
    }
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| failed(e.into()))?;

    let mut chunks = staging.read_ordered(job_id, ctx.total_chunks());
    let mut size_bytes = 0u64;
    let mut index = 0u32;

    loop {
        if let Err(e) = ctx.wait_while_paused().await {
            tracing::info!(job_id, index, "assembly cancelled");
            return Err(e);
        }

        let chunk = match chunks.next().await {
            Some(chunk) => chunk.map_err(failed)?,
            None => break,
        };
        file.write_all(&chunk).await.map_err(|e| failed(e.into()))?;
        size_bytes += chunk.len() as u64;
        index += 1;
    }

    file.flush().await.map_err(|e| failed(e.into()))?;
    file.sync_all().await.map_err(|e| failed(e.into()))?;

    tracing::debug!(job_id, chunks = index, size_bytes, "chunks assembled");
    Ok(Assembled { path, size_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobId, JobSpec};
    use bytes::Bytes;
    use spool_blob::FsStagingStore;

    #[tokio::test]
    async fn merges_in_index_order() {
        let root = tempfile::tempdir().unwrap();
        let staging = FsStagingStore::new(root.path());
        let ctx = JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 3));

        staging.prepare("job").await.unwrap();
        for (index, data) in [(2, "CCC"), (0, "AAA"), (1, "BBB")] {
            staging.write_chunk("job", index, Bytes::from(data)).await.unwrap();
            ctx.record_chunk(index);
        }

        claim(&ctx).await.unwrap();
        let assembled = assemble(&ctx, &staging).await.unwrap();
        assert_eq!(assembled.size_bytes, 9);
        assert_eq!(tokio::fs::read(&assembled.path).await.unwrap(), b"AAABBBCCC");
    }

    #[tokio::test]
    async fn claim_rejects_incomplete_and_second_claim() {
        let ctx = JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 2));
        ctx.record_chunk(0);
        assert!(matches!(
            claim(&ctx).await,
            Err(JobError::IncompleteUpload { received: 1, total: 2 })
        ));
        assert_eq!(ctx.status(), JobStatus::Uploading);

        ctx.record_chunk(1);
        claim(&ctx).await.unwrap();
        assert!(matches!(
            claim(&ctx).await,
            Err(JobError::AlreadyAssembling { status: JobStatus::Assembling })
        ));
    }

    #[tokio::test]
    async fn cancelled_before_copy_stops() {
        let root = tempfile::tempdir().unwrap();
        let staging = FsStagingStore::new(root.path());
        let ctx = JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 1));
        staging.prepare("job").await.unwrap();
        staging.write_chunk("job", 0, Bytes::from("x")).await.unwrap();
        ctx.record_chunk(0);
        claim(&ctx).await.unwrap();

        ctx.cancel();
        assert!(matches!(assemble(&ctx, &staging).await, Err(JobError::Cancelled)));
    }

    #[tokio::test]
    async fn claim_refuses_cancelled_job() {
        let ctx = JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 1));
        ctx.record_chunk(0);
        ctx.cancel();
        assert!(matches!(claim(&ctx).await, Err(JobError::Cancelled)));
        assert_eq!(ctx.status(), JobStatus::Uploading);
    }

    #[tokio::test]
    async fn claim_waits_for_inflight_write() {
        let ctx = std::sync::Arc::new(JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 1)));
        ctx.record_chunk(0);
        let writer = ctx.intake_shared().await;

        let claimer = {
            let ctx = ctx.clone();
            tokio::spawn(async move { claim(&ctx).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(ctx.status(), JobStatus::Uploading);

        drop(writer);
        claimer.await.unwrap().unwrap();
        assert_eq!(ctx.status(), JobStatus::Assembling);
    }

    #[tokio::test]
    async fn paused_assembly_waits_for_resume() {
        let root = tempfile::tempdir().unwrap();
        let staging = FsStagingStore::new(root.path());
        let ctx = std::sync::Arc::new(JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 1)));
        staging.prepare("job").await.unwrap();
        staging.write_chunk("job", 0, Bytes::from("x")).await.unwrap();
        ctx.record_chunk(0);
        claim(&ctx).await.unwrap();
        ctx.pause();

        let assembly = {
            let ctx = ctx.clone();
            let staging = staging.clone();
            tokio::spawn(async move { assemble(&ctx, &staging).await })
        };
        tokio::task::yield_now().await;
        assert!(!assembly.is_finished());

        ctx.resume();
        let assembled = assembly.await.unwrap().unwrap();
        assert_eq!(assembled.size_bytes, 1);
    }

    #[tokio::test]
    async fn missing_staged_chunk_fails_assembly() {
        let root = tempfile::tempdir().unwrap();
        let staging = FsStagingStore::new(root.path());
        let ctx = JobContext::new(JobId::from("job"), JobSpec::new("out.txt", 2));
        staging.prepare("job").await.unwrap();
        staging.write_chunk("job", 0, Bytes::from("x")).await.unwrap();
        ctx.record_chunk(0);
        ctx.record_chunk(1);

        claim(&ctx).await.unwrap();
        assert!(matches!(
            assemble(&ctx, &staging).await,
            Err(JobError::AssemblyFailed { .. })
        ));
    }
}
