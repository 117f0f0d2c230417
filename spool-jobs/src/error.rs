use spool_blob::BlobError;
use thiserror::Error;

use crate::{JobId, JobStatus};

/// Result type for job operations
pub type JobResult<T> = Result<T, JobError>;

/// Errors returned by the job control operations
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Chunk index {index} out of range (total chunks: {total})")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("Job is not accepting chunks (status: {status})")]
    NotAcceptingChunks { status: JobStatus },

    #[error("Upload incomplete: received {received} of {total} chunks")]
    IncompleteUpload { received: u32, total: u32 },

    #[error("Job assembly already started (status: {status})")]
    AlreadyAssembling { status: JobStatus },

    #[error("Job has been cancelled")]
    Cancelled,

    #[error("Assembly failed: {source}")]
    AssemblyFailed {
        #[source]
        source: BlobError,
    },

    #[error("Upload to blob store failed: {source}")]
    UploadFailed {
        #[source]
        source: BlobError,
    },

    #[error("Staging storage error: {source}")]
    Storage {
        #[source]
        source: BlobError,
    },
}

impl JobError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Stable error name, used as the `name` field of error responses
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::IndexOutOfRange { .. } => "IndexOutOfRange",
            Self::NotAcceptingChunks { .. } => "NotAcceptingChunks",
            Self::IncompleteUpload { .. } => "IncompleteUpload",
            Self::AlreadyAssembling { .. } => "AlreadyAssembling",
            Self::Cancelled => "Cancelled",
            Self::AssemblyFailed { .. } => "AssemblyFailed",
            Self::UploadFailed { .. } => "UploadFailed",
            Self::Storage { .. } => "Storage",
        }
    }
}

/// Failure of a single line handler invocation. Retried, then the line is skipped.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct LineError {
    message: String,
}

impl LineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
