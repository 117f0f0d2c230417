use spool_blob::{BlobError, BlobStore};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn, Instrument};

use crate::{JobContext, JobRegistry, JobStatus, LineHandler};

/// How the read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    EndOfStream,
    Cancelled,
}

/// Background task that streams an uploaded object back and feeds it,
/// line by line, to a [`LineHandler`].
pub(crate) struct StreamProcessor {
    pub ctx: Arc<JobContext>,
    pub store: Arc<dyn BlobStore>,
    pub handler: Arc<dyn LineHandler>,
    pub registry: Arc<JobRegistry>,
    pub max_line_attempts: u32,
}

impl StreamProcessor {
    pub fn spawn(self) -> JoinHandle<JobStatus> {
        let span = tracing::info_span!("stream_processor", job_id = %self.ctx.job_id());
        tokio::spawn(self.run().instrument(span))
    }

    async fn run(self) -> JobStatus {
        self.ctx.set_status(JobStatus::Running);
        info!(key = self.ctx.file_name(), "processing started");

        match self.read_lines().await {
            Ok(Exit::EndOfStream) if !self.ctx.is_cancelled() => {
                self.ctx.set_status(JobStatus::Completed);
                info!(
                    lines_processed = self.ctx.lines_processed(),
                    lines_skipped = self.ctx.lines_skipped(),
                    "processing completed"
                );
            }
            Ok(_) => {
                self.ctx.set_status(JobStatus::Cancelled);
                info!(lines_processed = self.ctx.lines_processed(), "processing cancelled");
            }
            Err(e) => {
                error!(error = %e, "processing failed");
                self.ctx.fail(e.to_string());
            }
        }

        self.registry.promote_to_completed(self.ctx.job_id());
        self.ctx.status()
    }

    async fn read_lines(&self) -> Result<Exit, BlobError> {
        let object = self.store.get(self.ctx.file_name()).await?;
        let mut reader = StreamReader::new(object.stream);
        let mut buf = Vec::new();
        let mut line_number = 0u64;

        loop {
            if self.ctx.is_cancelled() {
                return Ok(Exit::Cancelled);
            }
            if self.ctx.is_paused() {
                self.ctx.set_status(JobStatus::Paused);
                info!(line_number, "processing paused");
                if self.ctx.wait_while_paused().await.is_err() {
                    return Ok(Exit::Cancelled);
                }
                self.ctx.set_status(JobStatus::Running);
                info!(line_number, "processing resumed");
            }

            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(Exit::EndOfStream);
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }

            line_number += 1;
            let line = String::from_utf8_lossy(&buf);
            self.process_line_with_retry(line_number, &line).await;
        }
    }

    /// Returns false when every attempt failed and the line was skipped
    async fn process_line_with_retry(&self, line_number: u64, line: &str) -> bool {
        let job_id = self.ctx.job_id();
        let attempts = self.max_line_attempts.max(1);

        for attempt in 1..=attempts {
            match self.handler.handle(job_id, line_number, line).await {
                Ok(()) => {
                    self.ctx.record_line_processed();
                    return true;
                }
                Err(e) => {
                    warn!(line_number, attempt, attempts, error = %e, "line handler failed");
                }
            }
        }

        warn!(line_number, "skipping line after {} failed attempts", attempts);
        self.ctx.record_line_skipped();
        false
    }
}
