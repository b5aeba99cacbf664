// src/download.rs
//
// Single and batch downloads through an ObjectStore, optionally persisted
// to local files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::batch::{BatchReport, BatchRunner, Job};
use crate::error::{Result, S3Error};
use crate::logger::{DiagnosticSink, Level};
use crate::object_store::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub bucket: String,
    pub key: String,
    /// When set, the object is also written to this path.
    pub file_name: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            file_name: None,
        }
    }

    pub fn to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_name = Some(path.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct DownloadedObject {
    pub bucket: String,
    pub key: String,
    pub data: Bytes,
    pub file_name: Option<PathBuf>,
}

#[derive(Clone)]
pub struct DownloadOrchestrator {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) runner: BatchRunner,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
}

impl DownloadOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, runner: BatchRunner, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { store, runner, sink }
    }

    /// Fetch the full content of one object.
    pub async fn download_one(&self, bucket: &str, key: &str) -> Result<Bytes> {
        match self.store.get(bucket, key).await {
            Ok(data) => {
                debug!("downloaded s3://{}/{} ({} bytes)", bucket, key, data.len());
                Ok(data)
            }
            Err(e) => {
                self.sink.emit(
                    Level::ERROR,
                    &format!("Download file from bucket = {} key = {} error: {}", bucket, key, e),
                );
                Err(e)
            }
        }
    }

    /// Fill `output` with the object's content. `output` is only touched on
    /// success; it is cleared first.
    pub async fn download_one_into(&self, bucket: &str, key: &str, output: &mut Vec<u8>) -> Result<()> {
        let data = self.download_one(bucket, key).await?;
        output.clear();
        output.extend_from_slice(&data);
        Ok(())
    }

    /// Download every request concurrently. Per-object failures, including a
    /// failed write to `file_name`, land in the report and never stop the
    /// remaining downloads.
    pub async fn download_many(&self, requests: Vec<DownloadRequest>) -> BatchReport<DownloadedObject> {
        let jobs = requests
            .into_iter()
            .map(|DownloadRequest { bucket, key, file_name }| {
                let this = self.clone();
                Job::new(format!("s3://{}/{}", bucket, key), async move {
                    let data = this.download_one(&bucket, &key).await?;
                    if let Some(path) = &file_name {
                        this.persist(path, &data).await?;
                    }
                    Ok(Some(DownloadedObject {
                        bucket,
                        key,
                        data,
                        file_name,
                    }))
                })
            })
            .collect();
        self.runner.run("download", jobs).await
    }

    async fn persist(&self, path: &Path, data: &Bytes) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_failed(path, e))?;
        }
        tokio::fs::write(path, data)
            .await
            .map_err(|e| self.write_failed(path, e))
    }

    fn write_failed(&self, path: &Path, e: std::io::Error) -> S3Error {
        self.sink
            .emit(Level::ERROR, &format!("Write file {}: error {}", path.display(), e));
        S3Error::io(path.display().to_string(), e)
    }
}
