//! Server configuration.
//!
//! A flat string key/value store filled from environment variables. With the
//! prefix `SPOOL__`, `SPOOL__HTTP__PORT=8080` becomes `http.port = "8080"`.
//! Typed accessors below turn the values into store and job settings.
//!
//! | key | default |
//! |---|---|
//! | `http.host` | `127.0.0.1` |
//! | `http.port` | `3030` |
//! | `http.max_chunk_bytes` | 64 MiB |
//! | `staging.dir` | `<tmp>/spool-staging` |
//! | `blob.backend` | `memory` (`memory`, `fs`, `s3`) |
//! | `blob.dir` | `./blobs` |
//! | `s3.bucket`, `s3.region`, `s3.endpoint`, `s3.access_key`, `s3.secret_key` | none |
//! | `jobs.max_line_attempts`, `jobs.max_chunks`, `jobs.retain_staging` | see `JobConfig` |

use anyhow::{anyhow, Context, Result};
use spool_blob::S3Config;
use spool_jobs::JobConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "SPOOL__";

/// Which blob store the server writes assembled files to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    Memory,
    Fs,
    S3,
}

impl FromStr for BlobBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "fs" | "filesystem" => Ok(Self::Fs),
            "s3" => Ok(Self::S3),
            other => Err(anyhow!("unknown blob backend '{}' (expected memory, fs or s3)", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    values: HashMap<String, String>,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `SPOOL__*` variable from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars(), ENV_PREFIX)
    }

    /// Build from `(name, value)` pairs, keeping those starting with `prefix`
    pub fn from_vars<I>(vars: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                // SPOOL__JOBS__MAX_CHUNKS -> jobs.max_chunks
                let normalized = stripped.to_lowercase().replace("__", ".");
                config.set(normalized, value);
            }
        }
        config
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// Parse a value, failing loudly on malformed input
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow!("invalid value '{}' for {}: {}", raw, key, e)),
        }
    }

    pub fn http_addr(&self) -> String {
        let host = self.get("http.host").unwrap_or("127.0.0.1");
        let port = self.get("http.port").unwrap_or("3030");
        format!("{host}:{port}")
    }

    pub fn max_chunk_bytes(&self) -> Result<usize> {
        Ok(self
            .get_parsed("http.max_chunk_bytes")?
            .unwrap_or(spool_axum::DEFAULT_BODY_LIMIT))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.get("staging.dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("spool-staging"))
    }

    pub fn blob_backend(&self) -> Result<BlobBackend> {
        Ok(self.get_parsed("blob.backend")?.unwrap_or(BlobBackend::Memory))
    }

    pub fn blob_dir(&self) -> PathBuf {
        PathBuf::from(self.get("blob.dir").unwrap_or("./blobs"))
    }

    pub fn s3_config(&self) -> Result<S3Config> {
        let bucket = self
            .get_string("s3.bucket")
            .context("s3.bucket is required for the s3 blob backend")?;
        let region = self.get_string("s3.region").unwrap_or_else(|| "us-east-1".to_string());

        let mut config = S3Config::new(bucket, region);
        if let Some(endpoint) = self.get_string("s3.endpoint") {
            config = config.with_endpoint(endpoint);
        }
        if let (Some(key), Some(secret)) = (self.get_string("s3.access_key"), self.get_string("s3.secret_key")) {
            config = config.with_credentials(key, secret);
        }
        Ok(config)
    }

    pub fn job_config(&self) -> Result<JobConfig> {
        let mut config = JobConfig::default();
        if let Some(attempts) = self.get_parsed("jobs.max_line_attempts")? {
            config = config.with_max_line_attempts(attempts);
        }
        if let Some(max_chunks) = self.get_parsed("jobs.max_chunks")? {
            config = config.with_max_chunks(max_chunks);
        }
        if let Some(retention) = self.get_parsed("jobs.completed_retention")? {
            config = config.with_completed_retention(retention);
        }
        if let Some(retain) = self.get_parsed("jobs.retain_staging")? {
            config = config.with_retain_staging(retain);
        }
        Ok(config)
    }
}
