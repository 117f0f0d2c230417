use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::types::validate_key;
use crate::{BlobError, BlobResult, BlobStore, GetResult, ObjectHead, PutResult};

/// Blob store backed by a local directory. Keys map to relative paths under `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> BlobResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn modified_secs(meta: &std::fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

// Size and mtime are the only identity a plain file has.
fn file_etag(meta: &std::fs::Metadata) -> String {
    format!("\"{:x}-{:x}\"", meta.len(), modified_secs(meta).unwrap_or_default())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, local_path: &Path) -> BlobResult<PutResult> {
        let target = self.object_path(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Copy next to the target first so readers never see a partial object.
        let tmp = target.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let size_bytes = tokio::fs::copy(local_path, &tmp).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        let meta = tokio::fs::metadata(&target).await?;
        tracing::debug!(key, size_bytes, "stored object on filesystem");

        Ok(PutResult {
            etag: Some(file_etag(&meta)),
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let path = self.object_path(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::not_found(key))
            }
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;

        Ok(GetResult {
            stream: Box::pin(ReaderStream::new(file)),
            size_bytes: meta.len(),
            etag: Some(file_etag(&meta)),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let path = self.object_path(key)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::not_found(key))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(ObjectHead {
            size_bytes: meta.len(),
            etag: Some(file_etag(&meta)),
            last_modified: modified_secs(&meta),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
