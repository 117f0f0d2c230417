use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::types::validate_key;
use crate::{BlobError, BlobResult, BlobStore, GetResult, ObjectHead, PutResult};

/// Connection settings for an S3-compatible endpoint (AWS, Backblaze B2, MinIO, RustFS)
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint URL. `None` uses the AWS default for `region`.
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Path-style addressing, needed by most non-AWS services
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new<B: Into<String>, R: Into<String>>(bucket: B, region: R) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint_url: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            force_path_style: true,
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_credentials<A: Into<String>, S: Into<String>>(mut self, access_key_id: A, secret_access_key: S) -> Self {
        self.access_key_id = access_key_id.into();
        self.secret_access_key = secret_access_key.into();
        self
    }
}

/// Blob store for any S3-compatible object storage service
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> BlobResult<Self> {
        if config.bucket.is_empty() {
            return Err(BlobError::invalid("S3 bucket name is required"));
        }
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Ok(Self { client, bucket })
    }

    /// Wrap an already configured client
    pub fn from_client<B: Into<String>>(client: Client, bucket: B) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    async fn create_client(config: S3Config) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));

        if !config.access_key_id.is_empty() {
            let credentials = Credentials::new(
                config.access_key_id,
                config.secret_access_key,
                None,
                None,
                "spool",
            );
            loader = loader.credentials_provider(credentials);
        }
        if let Some(endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }
}

impl std::fmt::Debug for S3CompatibleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3CompatibleStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn put(&self, key: &str, local_path: &Path) -> BlobResult<PutResult> {
        validate_key(key)?;
        let size_bytes = tokio::fs::metadata(local_path).await?.len();
        let body = AwsByteStream::from_path(local_path)
            .await
            .map_err(Self::map_aws_error)?;

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size_bytes as i64)
            .body(body)
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        tracing::debug!(bucket = %self.bucket, key, size_bytes, "stored object in S3");

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let result = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(result) => result,
            Err(err) => {
                if err.as_service_error().map_or(false, |e| e.is_no_such_key()) {
                    return Err(BlobError::not_found(key));
                }
                return Err(Self::map_aws_error(err));
            }
        };

        let size_bytes = result.content_length.unwrap_or(0) as u64;
        let etag = result.e_tag;
        let reader = result.body.into_async_read();

        Ok(GetResult {
            stream: Box::pin(ReaderStream::new(reader)),
            size_bytes,
            etag,
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let result = match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(result) => result,
            Err(err) => {
                if err.as_service_error().map_or(false, |e| e.is_not_found()) {
                    return Err(BlobError::not_found(key));
                }
                return Err(Self::map_aws_error(err));
            }
        };

        Ok(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0) as u64,
            etag: result.e_tag,
            last_modified: result.last_modified.map(|dt| dt.secs()),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }
}
