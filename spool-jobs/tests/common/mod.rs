#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use spool_blob::{
    BlobError, BlobResult, BlobStore, ChunkStream, FsStagingStore, GetResult, MemoryBlobStore,
    ObjectHead, PutResult, StagingStore,
};
use spool_jobs::{JobConfig, JobId, JobService, JobSpec, JobStatus, LineError, LineHandler};

/// Blocks the handler on one line until released
struct Gate {
    line_number: u64,
    reached: mpsc::UnboundedSender<u64>,
    release: Arc<Notify>,
}

/// Line handler that records every attempt and every handled line
#[derive(Default)]
pub struct RecordingHandler {
    handled: Mutex<Vec<String>>,
    attempts: Mutex<Vec<String>>,
    fail_prefix: Option<String>,
    gate: Option<Gate>,
}

impl RecordingHandler {
    /// Fail every attempt on lines starting with `prefix`
    pub fn failing_on(prefix: &str) -> Self {
        Self {
            fail_prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    /// Block on `line_number`; returns the handler plus the reached signal and release switch
    pub fn gated_at(line_number: u64) -> (Self, mpsc::UnboundedReceiver<u64>, Arc<Notify>) {
        let (reached, reached_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Notify::new());
        let handler = Self {
            gate: Some(Gate {
                line_number,
                reached,
                release: release.clone(),
            }),
            ..Self::default()
        };
        (handler, reached_rx, release)
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().clone()
    }

    pub fn attempts_for(&self, line: &str) -> usize {
        self.attempts.lock().iter().filter(|l| l.as_str() == line).count()
    }
}

#[async_trait]
impl LineHandler for RecordingHandler {
    async fn handle(&self, _job_id: &JobId, line_number: u64, line: &str) -> Result<(), LineError> {
        self.attempts.lock().push(line.to_string());

        if let Some(gate) = &self.gate {
            if gate.line_number == line_number {
                let _ = gate.reached.send(line_number);
                gate.release.notified().await;
            }
        }

        if let Some(prefix) = &self.fail_prefix {
            if line.starts_with(prefix.as_str()) {
                return Err(LineError::new(format!("rejected line {}", line_number)));
            }
        }

        self.handled.lock().push(line.to_string());
        Ok(())
    }
}

fn unavailable() -> BlobError {
    BlobError::backend(std::io::Error::new(
        std::io::ErrorKind::Other,
        "bucket unavailable",
    ))
}

/// Store whose puts always fail
#[derive(Debug, Clone, Default)]
pub struct FailingPutStore;

#[async_trait]
impl BlobStore for FailingPutStore {
    async fn put(&self, _key: &str, _local_path: &Path) -> BlobResult<PutResult> {
        Err(unavailable())
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        Err(BlobError::not_found(key))
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        Err(BlobError::not_found(key))
    }

    async fn delete(&self, _key: &str) -> BlobResult<()> {
        Ok(())
    }
}

/// Store that accepts puts but cannot serve reads
#[derive(Debug, Clone, Default)]
pub struct FailingGetStore {
    pub inner: MemoryBlobStore,
}

#[async_trait]
impl BlobStore for FailingGetStore {
    async fn put(&self, key: &str, local_path: &Path) -> BlobResult<PutResult> {
        self.inner.put(key, local_path).await
    }

    async fn get(&self, _key: &str) -> BlobResult<GetResult> {
        Err(unavailable())
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        self.inner.head(key).await
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.inner.delete(key).await
    }
}

/// Stalls one staging operation on `index` once armed, until released
pub struct StageGate {
    index: u32,
    armed: AtomicBool,
    reached: mpsc::UnboundedSender<u32>,
    release: Notify,
}

impl StageGate {
    pub fn new(index: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<u32>) {
        let (reached, reached_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Self {
            index,
            armed: AtomicBool::new(false),
            reached,
            release: Notify::new(),
        });
        (gate, reached_rx)
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self, index: u32) {
        if index == self.index && self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.reached.send(index);
            self.release.notified().await;
        }
    }
}

/// Filesystem staging whose chunk writes or ordered reads can be held at a gate
pub struct GatedStaging {
    inner: FsStagingStore,
    writes: Option<Arc<StageGate>>,
    reads: Option<Arc<StageGate>>,
}

impl GatedStaging {
    pub fn writes(inner: FsStagingStore, gate: Arc<StageGate>) -> Self {
        Self {
            inner,
            writes: Some(gate),
            reads: None,
        }
    }

    pub fn reads(inner: FsStagingStore, gate: Arc<StageGate>) -> Self {
        Self {
            inner,
            writes: None,
            reads: Some(gate),
        }
    }
}

#[async_trait]
impl StagingStore for GatedStaging {
    async fn prepare(&self, job_id: &str) -> BlobResult<()> {
        self.inner.prepare(job_id).await
    }

    async fn write_chunk(&self, job_id: &str, index: u32, data: Bytes) -> BlobResult<u64> {
        if let Some(gate) = &self.writes {
            gate.pass(index).await;
        }
        self.inner.write_chunk(job_id, index, data).await
    }

    fn read_ordered(&self, job_id: &str, total: u32) -> ChunkStream {
        let chunks = self.inner.read_ordered(job_id, total);
        let Some(gate) = self.reads.clone() else {
            return chunks;
        };
        Box::pin(chunks.enumerate().then(move |(index, chunk)| {
            let gate = gate.clone();
            async move {
                gate.pass(index as u32).await;
                chunk
            }
        }))
    }

    fn merge_path(&self, job_id: &str) -> BlobResult<PathBuf> {
        self.inner.merge_path(job_id)
    }

    async fn delete(&self, job_id: &str) -> BlobResult<()> {
        self.inner.delete(job_id).await
    }
}

pub struct Harness {
    pub jobs: JobService,
    pub store: MemoryBlobStore,
    pub handler: Arc<RecordingHandler>,
    pub staging_root: tempfile::TempDir,
}

impl Harness {
    pub fn new(handler: RecordingHandler) -> Self {
        Self::with_config(handler, JobConfig::default())
    }

    pub fn with_config(handler: RecordingHandler, config: JobConfig) -> Self {
        // Small read frames so lines straddle frame boundaries.
        let store = MemoryBlobStore::new().with_read_frame_bytes(5);
        Self::with_store(handler, config, store.clone(), Arc::new(store))
    }

    pub fn with_store(
        handler: RecordingHandler,
        config: JobConfig,
        store: MemoryBlobStore,
        backend: Arc<dyn BlobStore>,
    ) -> Self {
        Self::build(handler, config, store, backend, |fs| {
            Arc::new(fs) as Arc<dyn StagingStore>
        })
    }

    /// Wrap the filesystem staging store, e.g. in a [`GatedStaging`]
    pub fn with_staging<F>(handler: RecordingHandler, wrap: F) -> Self
    where
        F: FnOnce(FsStagingStore) -> Arc<dyn StagingStore>,
    {
        let store = MemoryBlobStore::new();
        Self::build(handler, JobConfig::default(), store.clone(), Arc::new(store), wrap)
    }

    fn build<F>(
        handler: RecordingHandler,
        config: JobConfig,
        store: MemoryBlobStore,
        backend: Arc<dyn BlobStore>,
        wrap: F,
    ) -> Self
    where
        F: FnOnce(FsStagingStore) -> Arc<dyn StagingStore>,
    {
        let staging_root = tempfile::tempdir().expect("staging dir");
        let handler = Arc::new(handler);
        let jobs = JobService::from_parts(
            wrap(FsStagingStore::new(staging_root.path())),
            backend,
            handler.clone(),
            config,
        );
        Self {
            jobs,
            store,
            handler,
            staging_root,
        }
    }

    pub async fn init(&self, file_name: &str, total_chunks: u32) -> JobId {
        self.jobs
            .init(JobSpec::new(file_name, total_chunks))
            .await
            .expect("init")
            .job_id
    }

    pub async fn upload(&self, job_id: &JobId, chunks: &[(u32, &'static str)]) {
        for &(index, data) in chunks {
            self.jobs
                .upload_chunk(job_id, index, Bytes::from_static(data.as_bytes()))
                .await
                .expect("chunk upload");
        }
    }

    pub fn staging_dir(&self, job_id: &JobId) -> PathBuf {
        self.staging_root.path().join(job_id.as_str())
    }

    pub async fn wait_for(&self, job_id: &JobId, target: JobStatus) {
        let mut rx = self.jobs.watch(job_id).expect("watch");
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", target))
            .expect("status channel closed");
    }

    pub async fn wait_terminal(&self, job_id: &JobId) -> JobStatus {
        let mut rx = self.jobs.watch(job_id).expect("watch");
        let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.is_terminal()))
            .await
            .expect("timed out waiting for a terminal status")
            .expect("status channel closed");
        *status
    }
}

pub fn lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}
