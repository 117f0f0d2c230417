use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::{BlobError, BlobResult, ChunkStream};

const MERGED_FILE: &str = "assembled";

/// Local scratch space holding a job's chunks until they are assembled.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Create the staging area for a job. Calling it twice is harmless.
    async fn prepare(&self, job_id: &str) -> BlobResult<()>;

    /// Store one chunk, replacing any earlier payload for the same index.
    /// Fails with `NotFound` unless `prepare` ran and `delete` has not.
    /// Returns the number of bytes written.
    async fn write_chunk(&self, job_id: &str, index: u32, data: Bytes) -> BlobResult<u64>;

    /// Stream chunk payloads in ascending index order `0..total`.
    /// A missing chunk ends the stream with an error.
    fn read_ordered(&self, job_id: &str, total: u32) -> ChunkStream;

    /// Path of the file the chunks are merged into
    fn merge_path(&self, job_id: &str) -> BlobResult<PathBuf>;

    /// Remove everything staged for a job
    async fn delete(&self, job_id: &str) -> BlobResult<()>;
}

/// Staging store keeping one directory per job under `root`:
///
/// ```text
/// <root>/<job_id>/chunk-000000.part
/// <root>/<job_id>/chunk-000001.part
/// <root>/<job_id>/assembled
/// ```
#[derive(Debug, Clone)]
pub struct FsStagingStore {
    root: PathBuf,
}

impl FsStagingStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: &str) -> BlobResult<PathBuf> {
        let valid = !job_id.is_empty()
            && job_id != "."
            && job_id != ".."
            && !job_id.contains(|c: char| c == '/' || c == '\\');
        if !valid {
            return Err(BlobError::invalid(format!("Invalid staging id: {}", job_id)));
        }
        Ok(self.root.join(job_id))
    }

    fn chunk_path(dir: &Path, index: u32) -> PathBuf {
        dir.join(format!("chunk-{:06}.part", index))
    }
}

#[async_trait]
impl StagingStore for FsStagingStore {
    async fn prepare(&self, job_id: &str) -> BlobResult<()> {
        let dir = self.job_dir(job_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn write_chunk(&self, job_id: &str, index: u32, data: Bytes) -> BlobResult<u64> {
        let dir = self.job_dir(job_id)?;
        let target = Self::chunk_path(&dir, index);
        let tmp = dir.join(format!("chunk-{:06}.{}.tmp", index, uuid::Uuid::new_v4().simple()));

        // Only `prepare` creates the job directory; a deleted area stays deleted.
        let mut file = match tokio::fs::File::create(&tmp).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::not_found(format!("staging area {}", job_id)))
            }
            Err(e) => return Err(e.into()),
        };
        let written = async {
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        // Rename over the old payload so a concurrent reader sees old or new, never half.
        let result = match written {
            Ok(()) => tokio::fs::rename(&tmp, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(job_id, index, bytes = data.len(), "staged chunk");
        Ok(data.len() as u64)
    }

    fn read_ordered(&self, job_id: &str, total: u32) -> ChunkStream {
        let dir = self.job_dir(job_id);
        let stream = async_stream::stream! {
            let dir = match dir {
                Ok(dir) => dir,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for index in 0..total {
                let path = Self::chunk_path(&dir, index);
                match tokio::fs::read(&path).await {
                    Ok(data) => yield Ok(Bytes::from(data)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        yield Err(BlobError::not_found(path.display().to_string()));
                        return;
                    }
                    Err(e) => {
                        yield Err(BlobError::from(e));
                        return;
                    }
                }
            }
        };
        Box::pin(stream)
    }

    fn merge_path(&self, job_id: &str) -> BlobResult<PathBuf> {
        Ok(self.job_dir(job_id)?.join(MERGED_FILE))
    }

    async fn delete(&self, job_id: &str) -> BlobResult<()> {
        let dir = self.job_dir(job_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
