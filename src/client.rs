// src/client.rs
//
//! [`Client`]: one entry point wiring config, storage backend, diagnostic
//! sink and the upload/download orchestrators together.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use crate::batch::{BatchReport, BatchRunner};
use crate::config::ClientConfig;
use crate::download::{DownloadOrchestrator, DownloadRequest, DownloadedObject};
use crate::error::{Result, S3Error};
use crate::log_upload::{LogUploadReport, LogUploadRequest};
use crate::logger::{DiagnosticSink, Level, TracingSink};
use crate::object_store::ObjectStore;
use crate::s3_client::S3ObjectStore;
use crate::signature::{build_signature, Signature, SignaturePolicy};
use crate::upload::{UploadOrchestrator, UploadRequest};

#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn DiagnosticSink>,
    uploader: UploadOrchestrator,
    downloader: DownloadOrchestrator,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Builder for a [`Client`] with a non-default backend or sink.
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn ObjectStore>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl ClientBuilder {
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Client {
        let config = Arc::new(self.config);
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(S3ObjectStore::new((*config).clone())) as Arc<dyn ObjectStore>,
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let runner = BatchRunner::new(config.max_in_flight, sink.clone());

        Client {
            uploader: UploadOrchestrator::new(store.clone(), runner.clone(), sink.clone()),
            downloader: DownloadOrchestrator::new(store.clone(), runner, sink.clone()),
            config,
            store,
            sink,
        }
    }
}

impl Client {
    /// S3-backed client logging through `tracing`. No network traffic happens
    /// until the first operation.
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            store: None,
            sink: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn uploader(&self) -> &UploadOrchestrator {
        &self.uploader
    }

    pub fn downloader(&self) -> &DownloadOrchestrator {
        &self.downloader
    }

    pub async fn upload_one(&self, request: UploadRequest) -> Result<String> {
        self.uploader.upload_one(request).await
    }

    pub async fn upload_many(&self, requests: Vec<UploadRequest>) -> BatchReport<String> {
        self.uploader.upload_many(requests).await
    }

    pub async fn upload_log_directory(&self, request: LogUploadRequest) -> Result<LogUploadReport> {
        self.uploader.upload_log_directory(request).await
    }

    pub async fn download_one(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.downloader.download_one(bucket, key).await
    }

    pub async fn download_one_into(&self, bucket: &str, key: &str, output: &mut Vec<u8>) -> Result<()> {
        self.downloader.download_one_into(bucket, key, output).await
    }

    pub async fn download_many(&self, requests: Vec<DownloadRequest>) -> BatchReport<DownloadedObject> {
        self.downloader.download_many(requests).await
    }

    /// Public URL of `bucket/key` if the object exists.
    ///
    /// A missing object is reported as [`S3Error::NotFound`], distinct from
    /// any other failure of the HEAD request.
    pub async fn check_exists(&self, bucket: &str, key: &str) -> Result<String> {
        if bucket.is_empty() || key.is_empty() {
            return Err(S3Error::InvalidRequest("bucket and key are required".to_string()));
        }
        match self.store.head(bucket, key).await {
            Ok(head) => {
                debug!("s3://{}/{} exists ({} bytes)", bucket, key, head.size);
                Ok(self.config.public_url(bucket, key))
            }
            Err(e) => {
                if !e.is_not_found() {
                    self.sink
                        .emit(Level::ERROR, &format!("Check s3://{}/{} error: {}", bucket, key, e));
                }
                Err(e)
            }
        }
    }

    /// Browser upload policy signed with this client's credentials, issued now.
    pub fn generate_signature(&self, policy: &SignaturePolicy) -> Result<Signature> {
        build_signature(&self.config.signing_context(), policy, Utc::now())
    }
}
