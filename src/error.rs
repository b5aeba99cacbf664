// src/error.rs
//
// Error taxonomy shared by every storage operation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = S3Error> = std::result::Result<T, E>;

/// Coarse classification of an [`S3Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Session,
    Transfer,
    NotFound,
    NoFiles,
    Io,
    InvalidRequest,
    Job,
}

#[derive(Error, Debug)]
pub enum S3Error {
    /// Credentials or the SDK session could not be established.
    #[error("failed to establish storage session: {0}")]
    Session(String),

    /// A put/get/head call failed (network, auth, bucket policy, ...).
    #[error("{op} s3://{bucket}/{key} failed: {message}")]
    Transfer {
        op: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    /// A head check determined the object does not exist.
    #[error("object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    /// A log directory scan matched no uploadable files.
    #[error("no files to upload under {}", dir.display())]
    NoFiles { dir: PathBuf },

    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {message}", dir.display())]
    Walk { dir: PathBuf, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job {id} panicked")]
    JobPanicked { id: String },

    /// Strict-mode conversion of a batch that had failures.
    #[error("{failed} of {total} batch jobs failed")]
    BatchFailed { failed: usize, total: usize },
}

impl S3Error {
    pub fn transfer(
        op: &'static str,
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        S3Error::Transfer {
            op,
            bucket: bucket.into(),
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        S3Error::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        S3Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            S3Error::Session(_) => ErrorKind::Session,
            S3Error::Transfer { .. } => ErrorKind::Transfer,
            S3Error::NotFound { .. } => ErrorKind::NotFound,
            S3Error::NoFiles { .. } => ErrorKind::NoFiles,
            S3Error::Io { .. } | S3Error::Walk { .. } => ErrorKind::Io,
            S3Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            S3Error::JobPanicked { .. } | S3Error::BatchFailed { .. } => ErrorKind::Job,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
