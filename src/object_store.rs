// src/object_store.rs
//
// Pluggable object-store abstraction addressed by bucket + key.
// Backends: S3ObjectStore (AWS SDK), MemoryObjectStore (in-process).

use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::constants::DEFAULT_ACL;
use crate::error::Result;

/// Streaming request body. Consumed exactly once by [`ObjectStore::put`].
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

pub fn body_from_bytes(data: impl Into<Bytes>) -> Body {
    Box::pin(Cursor::new(data.into()))
}

/// Object attributes sent along with a PUT.
#[derive(Debug, Clone, PartialEq)]
pub struct PutAttributes {
    pub acl: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl Default for PutAttributes {
    fn default() -> Self {
        Self {
            acl: DEFAULT_ACL.to_string(),
            content_type: None,
            content_disposition: None,
            cache_control: None,
            expires: None,
            metadata: HashMap::new(),
        }
    }
}

/// Result of a successful HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub content_type: Option<String>,
    pub e_tag: Option<String>,
}

/// Storage backend used by the orchestrators.
///
/// Implementations map backend failures onto the crate taxonomy:
/// credential problems are `Session`, a missing object on `head` is
/// `NotFound`, everything else is `Transfer`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `body` to `bucket/key` and return the object's location.
    async fn put(&self, bucket: &str, key: &str, body: Body, attrs: &PutAttributes)
        -> Result<String>;

    /// Fetch the whole object into memory.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectHead>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn body_from_bytes_reads_back() {
        let mut body = body_from_bytes(&b"hello body"[..]);
        let mut out = Vec::new();
        body.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello body");
    }

    #[test]
    fn default_attributes_are_public_read() {
        let attrs = PutAttributes::default();
        assert_eq!(attrs.acl, "public-read");
        assert!(attrs.content_type.is_none());
        assert!(attrs.metadata.is_empty());
    }
}
