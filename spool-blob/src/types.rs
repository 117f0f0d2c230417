use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;

use crate::BlobResult;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Ordered stream of staged chunk payloads, one item per chunk
pub type ChunkStream = Pin<Box<dyn Stream<Item = BlobResult<Bytes>> + Send>>;

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    /// Content tag reported by the store
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub etag: Option<String>,
}

impl std::fmt::Debug for GetResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResult")
            .field("size_bytes", &self.size_bytes)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// Metadata about a stored object
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Reject keys that could escape a store root or address nothing.
pub(crate) fn validate_key(key: &str) -> BlobResult<()> {
    if key.is_empty() {
        return Err(crate::BlobError::invalid("Key must not be empty"));
    }
    if key.starts_with('/') || key.split(|c: char| c == '/' || c == '\\').any(|part| part == "..") {
        return Err(crate::BlobError::invalid(format!("Invalid key: {}", key)));
    }
    Ok(())
}
