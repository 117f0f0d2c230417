//! # spool-blob: storage collaborators for chunked uploads
//!
//! `spool-blob` holds the two storage seams a chunked upload passes through:
//!
//! - **Staging**: a local scratch area where chunks land in any order and are
//!   read back strictly by index ([`StagingStore`], [`FsStagingStore`]).
//! - **Blob storage**: the remote object store the assembled file is pushed to
//!   and later streamed back from ([`BlobStore`]).
//!
//! Three blob stores ship with the crate:
//!
//! - [`MemoryBlobStore`] for tests and local development
//! - [`FsBlobStore`] mapping keys onto a directory
//! - [`S3CompatibleStore`] for AWS S3, Backblaze B2, MinIO and other S3 APIs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spool_blob::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let staging = FsStagingStore::new("/tmp/spool-staging");
//! let store = MemoryBlobStore::new();
//!
//! staging.prepare("job-1").await?;
//! staging.write_chunk("job-1", 1, Bytes::from("world\n")).await?;
//! staging.write_chunk("job-1", 0, Bytes::from("hello ")).await?;
//!
//! // ... merge `read_ordered("job-1", 2)` into `merge_path("job-1")` ...
//! let merged = staging.merge_path("job-1")?;
//! let put = store.put("greeting.txt", &merged).await?;
//! println!("stored {} bytes", put.size_bytes);
//! # Ok(())
//! # }
//! ```

mod error;
mod fs_store;
mod memory_store;
mod s3_store;
pub mod staging;
pub mod store;
mod types;

pub use error::{BlobError, BlobResult};
pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;
pub use s3_store::{S3CompatibleStore, S3Config};
pub use staging::{FsStagingStore, StagingStore};
pub use store::BlobStore;
pub use types::{ByteStream, ChunkStream, GetResult, ObjectHead, PutResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobResult, BlobStore, ByteStream, ChunkStream, FsBlobStore, FsStagingStore,
        GetResult, MemoryBlobStore, PutResult, StagingStore,
    };
}
