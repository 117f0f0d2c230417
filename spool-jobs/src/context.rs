use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{watch, Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use crate::{JobError, JobId, JobResult, JobSnapshot, JobSpec, JobStatus};

/// Shared state of one upload job.
///
/// Held as `Arc<JobContext>` by the registry, request handlers and the
/// job's stream processor. Flags are lock-free to read; status changes go
/// through the watch channel so transitions are atomic and observable.
#[derive(Debug)]
pub struct JobContext {
    job_id: JobId,
    spec: JobSpec,
    created_at: DateTime<Utc>,

    status: watch::Sender<JobStatus>,
    history: Mutex<Vec<JobStatus>>,

    paused: AtomicBool,
    cancellation: CancellationToken,
    wake: Notify,

    received: Mutex<BTreeSet<u32>>,
    intake: RwLock<()>,

    lines_processed: AtomicU64,
    lines_skipped: AtomicU64,
    error: Mutex<Option<String>>,
    etag: Mutex<Option<String>>,
}

impl JobContext {
    pub fn new(job_id: JobId, spec: JobSpec) -> Self {
        let (status, _) = watch::channel(JobStatus::Uploading);
        Self {
            job_id,
            spec,
            created_at: Utc::now(),
            status,
            history: Mutex::new(vec![JobStatus::Uploading]),
            paused: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
            wake: Notify::new(),
            received: Mutex::new(BTreeSet::new()),
            intake: RwLock::new(()),
            lines_processed: AtomicU64::new(0),
            lines_skipped: AtomicU64::new(0),
            error: Mutex::new(None),
            etag: Mutex::new(None),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn file_name(&self) -> &str {
        &self.spec.file_name
    }

    pub fn total_chunks(&self) -> u32 {
        self.spec.total_chunks
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ---- status ----

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Every status this job has been in, oldest first
    pub fn history(&self) -> Vec<JobStatus> {
        self.history.lock().clone()
    }

    /// Apply `next` if `allow` accepts the current status. Terminal statuses never change.
    /// Returns the status observed before the attempt.
    fn transition<F>(&self, next: JobStatus, allow: F) -> Result<JobStatus, JobStatus>
    where
        F: FnOnce(JobStatus) -> bool,
    {
        let mut observed = JobStatus::Uploading;
        let changed = self.status.send_if_modified(|current| {
            observed = *current;
            if current.is_terminal() || *current == next || !allow(*current) {
                return false;
            }
            *current = next;
            self.history.lock().push(next);
            true
        });
        if changed {
            tracing::debug!(job_id = %self.job_id, from = %observed, to = %next, "job status changed");
            Ok(observed)
        } else {
            Err(observed)
        }
    }

    /// Move from `expected` to `next` atomically. On failure returns the status observed.
    pub fn compare_and_set(&self, expected: JobStatus, next: JobStatus) -> Result<(), JobStatus> {
        self.transition(next, |current| current == expected).map(|_| ())
    }

    /// Set `next` unless the job already reached a terminal status.
    /// Returns true when the status changed.
    pub fn set_status(&self, next: JobStatus) -> bool {
        self.transition(next, |_| true).is_ok()
    }

    /// Enter `FAILED`, recording the cause. No-op on a terminal job.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let mut error = self.error.lock();
        let changed = self.set_status(JobStatus::Failed);
        if changed {
            *error = Some(reason);
        }
        changed
    }

    /// `ASSEMBLING -> UPLOADED`, recording the tag the blob store returned
    pub fn mark_uploaded(&self, etag: Option<String>) -> Result<(), JobStatus> {
        let mut stored = self.etag.lock();
        self.compare_and_set(JobStatus::Assembling, JobStatus::Uploaded)?;
        *stored = etag;
        Ok(())
    }

    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    pub fn etag(&self) -> Option<String> {
        self.etag.lock().clone()
    }

    // ---- pause / resume / cancel ----

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns true if the job was not already paused
    pub fn pause(&self) -> bool {
        !self.paused.swap(true, Ordering::SeqCst)
    }

    /// Clear the pause flag and wake suspended waiters. Returns false if not paused.
    pub fn resume(&self) -> bool {
        let was_paused = self.paused.swap(false, Ordering::SeqCst);
        if was_paused {
            self.wake.notify_waiters();
        }
        was_paused
    }

    /// Latch cancellation and wake everything suspended on this job
    pub fn cancel(&self) {
        self.cancellation.cancel();
        self.paused.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Suspend while the job is paused.
    ///
    /// Returns `Err(Cancelled)` if the job is or becomes cancelled.
    pub async fn wait_while_paused(&self) -> JobResult<()> {
        loop {
            if self.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            if !self.is_paused() {
                return Ok(());
            }

            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register before re-checking so a resume in between is not lost.
            notified.as_mut().enable();

            if self.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            if !self.is_paused() {
                return Ok(());
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.cancellation.cancelled() => return Err(JobError::Cancelled),
            }
        }
    }

    // ---- chunks ----

    /// Shared guard held by a chunk write from its final status check until
    /// the index is recorded
    pub async fn intake_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.intake.read().await
    }

    /// Exclusive guard: no chunk write is in flight while it is held
    pub async fn intake_exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.intake.write().await
    }

    /// Record a stored chunk index. Returns the number of distinct chunks received.
    pub fn record_chunk(&self, index: u32) -> u32 {
        let mut received = self.received.lock();
        received.insert(index);
        received.len() as u32
    }

    pub fn received_count(&self) -> u32 {
        self.received.lock().len() as u32
    }

    pub fn received_indices(&self) -> Vec<u32> {
        self.received.lock().iter().copied().collect()
    }

    pub fn all_chunks_received(&self) -> bool {
        self.received_count() == self.total_chunks()
    }

    // ---- line counters ----

    pub fn record_line_processed(&self) {
        self.lines_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line_skipped(&self) {
        self.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines_processed(&self) -> u64 {
        self.lines_processed.load(Ordering::Relaxed)
    }

    pub fn lines_skipped(&self) -> u64 {
        self.lines_skipped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            file_name: self.spec.file_name.clone(),
            status: self.status(),
            paused: self.is_paused(),
            cancelled: self.is_cancelled(),
            received_chunks: self.received_count(),
            total_chunks: self.spec.total_chunks,
            file_size: self.spec.file_size,
            chunk_size: self.spec.chunk_size,
            lines_processed: self.lines_processed(),
            lines_skipped: self.lines_skipped(),
            etag: self.etag(),
            error: self.error(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(total: u32) -> JobContext {
        JobContext::new(JobId::new(), JobSpec::new("data.txt", total))
    }

    #[test]
    fn compare_and_set_reports_observed_status() {
        let ctx = context(1);
        assert!(ctx.compare_and_set(JobStatus::Uploading, JobStatus::Assembling).is_ok());
        assert_eq!(
            ctx.compare_and_set(JobStatus::Uploading, JobStatus::Assembling),
            Err(JobStatus::Assembling)
        );
    }

    #[test]
    fn terminal_status_is_never_overwritten() {
        let ctx = context(1);
        assert!(ctx.set_status(JobStatus::Cancelled));
        assert!(!ctx.set_status(JobStatus::Completed));
        assert!(!ctx.fail("late"));
        assert_eq!(ctx.status(), JobStatus::Cancelled);
        assert_eq!(ctx.error(), None);
        assert_eq!(ctx.history(), vec![JobStatus::Uploading, JobStatus::Cancelled]);
    }

    #[test]
    fn fail_records_reason() {
        let ctx = context(1);
        assert!(ctx.fail("disk full"));
        assert_eq!(ctx.status(), JobStatus::Failed);
        assert_eq!(ctx.error().as_deref(), Some("disk full"));
    }

    #[test]
    fn chunk_set_ignores_duplicates() {
        let ctx = context(3);
        assert_eq!(ctx.record_chunk(2), 1);
        assert_eq!(ctx.record_chunk(0), 2);
        assert_eq!(ctx.record_chunk(2), 2);
        assert!(!ctx.all_chunks_received());
        ctx.record_chunk(1);
        assert!(ctx.all_chunks_received());
        assert_eq!(ctx.received_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let ctx = context(1);
        assert!(!ctx.resume());
        assert!(ctx.pause());
        assert!(!ctx.pause());
        assert!(ctx.is_paused());
        assert!(ctx.resume());
        assert!(!ctx.is_paused());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_not_paused() {
        let ctx = context(1);
        ctx.wait_while_paused().await.unwrap();
    }

    #[tokio::test]
    async fn resume_wakes_waiter() {
        let ctx = Arc::new(context(1));
        ctx.pause();

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.wait_while_paused().await })
        };
        tokio::task::yield_now().await;
        ctx.resume();

        let result = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancel_wakes_waiter_with_cancelled() {
        let ctx = Arc::new(context(1));
        ctx.pause();

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.wait_while_paused().await })
        };
        tokio::task::yield_now().await;
        ctx.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(JobError::Cancelled)));
    }

    #[tokio::test]
    async fn exclusive_intake_waits_for_writers() {
        let ctx = Arc::new(context(1));
        let writer = ctx.intake_shared().await;

        let closer = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let _guard = ctx.intake_exclusive().await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!closer.is_finished());

        drop(writer);
        tokio::time::timeout(Duration::from_secs(5), closer)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn watch_sees_transitions() {
        let ctx = context(1);
        let mut rx = ctx.subscribe();
        ctx.set_status(JobStatus::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), JobStatus::Running);
    }
}
