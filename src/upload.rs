// src/upload.rs
//
// Single and batch uploads through an ObjectStore.

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::batch::{BatchReport, BatchRunner, Job};
use crate::constants::{CONTENT_SNIFF_LEN, DEFAULT_ACL};
use crate::error::{Result, S3Error};
use crate::logger::{DiagnosticSink, Level};
use crate::object_store::{Body, ObjectStore, PutAttributes};

/// One object to upload. Only `bucket`, `key` and `body` are required.
pub struct UploadRequest {
    pub bucket: String,
    pub key: String,
    pub body: Body,
    /// Canned ACL; `public-read` when unset.
    pub acl: Option<String>,
    /// Sniffed from the first bytes of `body` when unset.
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("acl", &self.acl)
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("cache_control", &self.cache_control)
            .field("expires", &self.expires)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl UploadRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: Body) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            acl: None,
            content_type: None,
            content_disposition: None,
            cache_control: None,
            expires: None,
            metadata: HashMap::new(),
        }
    }

    pub fn acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = Some(acl.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }

    pub fn cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) runner: BatchRunner,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, runner: BatchRunner, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { store, runner, sink }
    }

    /// Upload one object and return its location. The body is consumed.
    pub async fn upload_one(&self, request: UploadRequest) -> Result<String> {
        let UploadRequest {
            bucket,
            key,
            body,
            acl,
            content_type,
            content_disposition,
            cache_control,
            expires,
            metadata,
        } = request;

        let (content_type, body) = match content_type.filter(|ct| !ct.is_empty()) {
            Some(ct) => (ct, body),
            None => match sniff_body(body).await {
                Ok(sniffed) => sniffed,
                Err(e) => {
                    self.sink
                        .emit(Level::ERROR, &format!("Upload s3://{}/{} error: {}", bucket, key, e));
                    return Err(e);
                }
            },
        };

        let attrs = PutAttributes {
            acl: acl.filter(|a| !a.is_empty()).unwrap_or_else(|| DEFAULT_ACL.to_string()),
            content_type: Some(content_type),
            content_disposition: content_disposition.filter(|d| !d.is_empty()),
            cache_control,
            expires,
            metadata,
        };

        match self.store.put(&bucket, &key, body, &attrs).await {
            Ok(location) => {
                debug!("uploaded s3://{}/{} → {}", bucket, key, location);
                Ok(location)
            }
            Err(e) => {
                self.sink
                    .emit(Level::ERROR, &format!("Upload s3://{}/{} error: {}", bucket, key, e));
                Err(e)
            }
        }
    }

    /// Upload every request concurrently. Failures are logged and reported
    /// in the returned [`BatchReport`]; they never stop the other uploads.
    pub async fn upload_many(&self, requests: Vec<UploadRequest>) -> BatchReport<String> {
        let jobs = requests
            .into_iter()
            .map(|request| {
                let id = format!("s3://{}/{}", request.bucket, request.key);
                let this = self.clone();
                Job::new(id, async move {
                    let location = this.upload_one(request).await?;
                    Ok((!location.is_empty()).then_some(location))
                })
            })
            .collect();
        self.runner.run("upload", jobs).await
    }
}

/// Peek at the start of `body` to pick a content type, then hand back a body
/// that still yields every byte.
async fn sniff_body(mut body: Body) -> Result<(String, Body)> {
    let mut head = Vec::with_capacity(CONTENT_SNIFF_LEN);
    body.as_mut()
        .take(CONTENT_SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await
        .map_err(|e| S3Error::io("upload body", e))?;

    let content_type = sniff_content_type(&head).to_string();
    let rebuilt: Body = Box::pin(Cursor::new(head).chain(body));
    Ok((content_type, rebuilt))
}

/// Best-effort content type from leading bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"\x1F\x8B\x08", "application/x-gzip"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x28\xB5\x2F\xFD", "application/zstd"),
        (b"OggS\x00", "application/ogg"),
        (b"\x00asm", "application/wasm"),
    ];

    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    if let Some(ct) = SIGNATURES
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, ct)| *ct)
    {
        return ct;
    }

    let text = trim_leading_whitespace(data);
    let lower: Vec<u8> = text.iter().take(16).map(u8::to_ascii_lowercase).collect();
    if lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html") {
        return "text/html; charset=utf-8";
    }
    if lower.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if looks_like_text(data) {
        return "text/plain; charset=utf-8";
    }
    "application/octet-stream"
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn looks_like_text(data: &[u8]) -> bool {
    // A sniff window may cut a multi-byte character at the end
    let valid = match std::str::from_utf8(data) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !data
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::body_from_bytes;

    #[test]
    fn sniff_known_signatures() {
        assert_eq!(sniff_content_type(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(sniff_content_type(b"\xFF\xD8\xFF\xE0\0\x10JFIF"), "image/jpeg");
        assert_eq!(sniff_content_type(b"\x1F\x8B\x08\0\0\0"), "application/x-gzip");
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
    }

    #[test]
    fn sniff_markup_and_text() {
        assert_eq!(sniff_content_type(b"  <!DOCTYPE html><html>"), "text/html; charset=utf-8");
        assert_eq!(sniff_content_type(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        assert_eq!(sniff_content_type(b"2022-04-18 INFO started\n"), "text/plain; charset=utf-8");
        assert_eq!(sniff_content_type(b""), "text/plain; charset=utf-8");
    }

    #[test]
    fn sniff_binary_falls_back() {
        assert_eq!(sniff_content_type(&[0u8, 1, 2, 3, 250]), "application/octet-stream");
    }

    #[test]
    fn truncated_utf8_still_counts_as_text() {
        let mut data = "héllo".as_bytes().to_vec();
        data.truncate(2); // cuts 'é' in half
        assert_eq!(sniff_content_type(&data), "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn sniff_body_preserves_every_byte() {
        let payload: Vec<u8> = b"%PDF-".iter().copied().chain((0..2000u32).map(|i| (i % 251) as u8)).collect();
        let (ct, mut body) = sniff_body(body_from_bytes(payload.clone())).await.unwrap();
        assert_eq!(ct, "application/pdf");

        let mut out = Vec::new();
        body.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = UploadRequest::new("b", "k", body_from_bytes("x"))
            .acl("private")
            .content_type("image/jpeg")
            .content_disposition("inline")
            .cache_control("max-age=60")
            .metadata("owner", "ops");
        assert_eq!(req.acl.as_deref(), Some("private"));
        assert_eq!(req.metadata.get("owner").map(String::as_str), Some("ops"));
        assert!(format!("{req:?}").contains("image/jpeg"));
    }
}
