use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::validate_key;
use crate::{BlobError, BlobResult, BlobStore, GetResult, ObjectHead, PutResult};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    stored_at: i64,
}

/// In-memory blob store for tests and development.
///
/// Cloning shares the underlying objects. Reads are served in frames of
/// `read_frame_bytes` so consumers see the same multi-frame streams a network
/// store would produce.
#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    read_frame_bytes: usize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            read_frame_bytes: 64 * 1024,
        }
    }

    /// Serve reads in frames of at most `bytes` bytes
    pub fn with_read_frame_bytes(mut self, bytes: usize) -> Self {
        self.read_frame_bytes = bytes.max(1);
        self
    }

    /// Insert an object directly, bypassing `put`
    pub fn insert<K: Into<String>, B: Into<Bytes>>(&self, key: K, data: B) -> String {
        let etag = format!("\"{}\"", Uuid::new_v4().simple());
        self.objects.write().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                etag: etag.clone(),
                stored_at: unix_now(),
            },
        );
        etag
    }

    /// Contents of a stored object
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, local_path: &Path) -> BlobResult<PutResult> {
        validate_key(key)?;
        let data = tokio::fs::read(local_path).await?;
        let size_bytes = data.len() as u64;
        let etag = self.insert(key, data);

        Ok(PutResult {
            etag: Some(etag),
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        let frame = self.read_frame_bytes;
        let data = object.data.clone();
        let stream = async_stream::stream! {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + frame).min(data.len());
                yield Ok::<Bytes, std::io::Error>(data.slice(offset..end));
                offset = end;
            }
        };

        Ok(GetResult {
            stream: Box::pin(stream),
            size_bytes: object.data.len() as u64,
            etag: Some(object.etag),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let objects = self.objects.read();
        let object = objects.get(key).ok_or_else(|| BlobError::not_found(key))?;
        Ok(ObjectHead {
            size_bytes: object.data.len() as u64,
            etag: Some(object.etag.clone()),
            last_modified: Some(object.stored_at),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.objects.write().remove(key);
        Ok(())
    }
}
