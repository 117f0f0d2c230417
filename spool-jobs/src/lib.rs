//! # spool-jobs: chunked upload jobs
//!
//! A job accepts a file as independently uploaded chunks, merges them in
//! index order, stores the result in a [`BlobStore`](spool_blob::BlobStore)
//! and then streams the stored object back line by line through a
//! [`LineHandler`], all under pause / resume / cancel control.
//!
//! ```text
//! init -> upload_chunk x N -> complete -> (assemble -> upload -> spawn processor)
//!                                                              |
//!                                  RUNNING <-> PAUSED -> COMPLETED / CANCELLED / FAILED
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spool_jobs::prelude::*;
//! use spool_blob::{FsStagingStore, MemoryBlobStore};
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> JobResult<()> {
//! let jobs = JobService::new(
//!     FsStagingStore::new("/tmp/spool-staging"),
//!     MemoryBlobStore::new(),
//!     TracingLineHandler,
//!     JobConfig::default(),
//! );
//!
//! let job = jobs.init(JobSpec::new("report.csv", 2)).await?;
//! jobs.upload_chunk(&job.job_id, 1, Bytes::from("b,2\n")).await?;
//! jobs.upload_chunk(&job.job_id, 0, Bytes::from("a,1\n")).await?;
//! jobs.complete(&job.job_id).await?;
//!
//! let mut status = jobs.watch(&job.job_id)?;
//! status.wait_for(|s| s.is_terminal()).await.ok();
//! # Ok(())
//! # }
//! ```

mod assembler;
mod config;
mod context;
mod error;
mod handler;
mod processor;
mod receiver;
mod registry;
mod service;
pub mod types;
mod upload;

pub use config::JobConfig;
pub use context::JobContext;
pub use error::{JobError, JobResult, LineError};
pub use handler::{LineHandler, TracingLineHandler};
pub use registry::JobRegistry;
pub use service::JobService;
pub use types::{
    ChunkReceipt, CompleteReceipt, InitRequest, InitResponse, JobId, JobSnapshot, JobSpec,
    JobStatus,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ChunkReceipt, CompleteReceipt, JobConfig, JobError, JobId, JobResult, JobService,
        JobSnapshot, JobSpec, JobStatus, LineError, LineHandler, TracingLineHandler,
    };
}
