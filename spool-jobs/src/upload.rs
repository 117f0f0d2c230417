use spool_blob::{BlobStore, PutResult};
use std::path::Path;

use crate::{JobError, JobResult};

/// Push the merged file to the blob store under `key`
pub(crate) async fn upload(store: &dyn BlobStore, key: &str, merged: &Path) -> JobResult<PutResult> {
    let result = store
        .put(key, merged)
        .await
        .map_err(|source| JobError::UploadFailed { source })?;

    tracing::info!(key, size_bytes = result.size_bytes, etag = ?result.etag, "uploaded assembled file");
    Ok(result)
}
