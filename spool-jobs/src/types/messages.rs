use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, JobStatus};

/// Declared shape of an upload, given at init
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Target key in the blob store
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub chunk_size: u64,
    pub total_chunks: u32,
}

impl JobSpec {
    pub fn new(file_name: impl Into<String>, total_chunks: u32) -> Self {
        Self {
            file_name: file_name.into(),
            file_size: 0,
            chunk_size: 0,
            total_chunks,
        }
    }

    pub fn with_sizes(mut self, file_size: u64, chunk_size: u64) -> Self {
        self.file_size = file_size;
        self.chunk_size = chunk_size;
        self
    }
}

/// Body of an init call
pub type InitRequest = JobSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Acknowledgement of one stored chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceipt {
    pub index: u32,
    /// Bytes stored for this chunk
    pub size: u64,
    /// Distinct chunks received so far
    pub received: u32,
    pub total: u32,
}

/// Result of a successful assemble and upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteReceipt {
    pub job_id: JobId,
    /// Blob store key the file was stored under
    pub key: String,
    pub size_bytes: u64,
    pub etag: Option<String>,
}

/// Point-in-time view of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub file_name: String,
    pub status: JobStatus,
    pub paused: bool,
    pub cancelled: bool,
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub file_size: u64,
    pub chunk_size: u64,
    pub lines_processed: u64,
    pub lines_skipped: u64,
    pub etag: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
