// src/lib.rs
//
// Crate root: module declarations and the public re-exports.
//
// s3batch uploads, downloads and checks objects in S3-compatible storage,
// fanning batches of independent transfers out over a bounded pool of Tokio
// tasks and gathering every outcome into a BatchReport. It also gzips and
// ships whole log directories and signs browser POST upload policies.

pub mod batch;
pub mod client;
pub mod config;
pub mod constants;
pub mod download;
pub mod error;
pub mod log_upload;
pub mod logger;
pub mod memory_store;
pub mod object_store;
pub mod s3_client;
pub mod signature;
pub mod upload;

pub use batch::{BatchReport, BatchRunner, Job, JobFailure};
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use download::{DownloadOrchestrator, DownloadRequest, DownloadedObject};
pub use error::{ErrorKind, Result, S3Error};
pub use log_upload::{collect_log_files, derive_log_key, LogUploadReport, LogUploadRequest, Retention};
pub use logger::{init_tracing, DiagnosticSink, MemorySink, StdoutSink, TracingSink};
pub use memory_store::MemoryObjectStore;
pub use object_store::{body_from_bytes, Body, ObjectHead, ObjectStore, PutAttributes};
pub use s3_client::S3ObjectStore;
pub use signature::{build_signature, Signature, SignaturePolicy, SigningContext};
pub use upload::{sniff_content_type, UploadOrchestrator, UploadRequest};
