use async_trait::async_trait;

use crate::{JobId, LineError};

/// Per-line work applied by the stream processor.
///
/// Errors are retried up to `JobConfig::max_line_attempts` times, after which
/// the line is skipped and processing continues with the next one.
#[async_trait]
pub trait LineHandler: Send + Sync {
    /// `line_number` starts at 1. `line` has its terminator stripped.
    async fn handle(&self, job_id: &JobId, line_number: u64, line: &str) -> Result<(), LineError>;
}

/// Handler that only logs each line
#[derive(Debug, Clone, Default)]
pub struct TracingLineHandler;

#[async_trait]
impl LineHandler for TracingLineHandler {
    async fn handle(&self, job_id: &JobId, line_number: u64, line: &str) -> Result<(), LineError> {
        tracing::debug!(%job_id, line_number, line, "processing line");
        Ok(())
    }
}
