use async_trait::async_trait;
use std::path::Path;

use crate::{BlobResult, GetResult, ObjectHead, PutResult};

/// Remote object storage holding assembled files - implemented by every backend
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the local file at `local_path` under `key`, replacing any previous object.
    async fn put(&self, key: &str, local_path: &Path) -> BlobResult<PutResult>;

    /// Open the object stored under `key` as a byte stream
    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    /// Get object metadata without content
    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> BlobResult<()>;
}
