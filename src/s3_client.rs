// src/s3_client.rs
//
//! AWS SDK backed [`ObjectStore`].
//!
//! The SDK client is built lazily on first use from static credentials and
//! then shared by every request issued through the store. Bodies that fit in
//! one part go out as a single PutObject; larger bodies are streamed as a
//! multipart upload with a bounded number of parts in flight, so a body is
//! never buffered in full.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::{stream::FuturesUnordered, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::constants::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::error::{Result, S3Error};
use crate::object_store::{Body, ObjectHead, ObjectStore, PutAttributes};

// PutObject and CreateMultipartUpload expose the same attribute setters.
macro_rules! apply_attributes {
    ($req:expr, $attrs:expr) => {{
        let attrs: &PutAttributes = $attrs;
        let mut req = $req.acl(ObjectCannedAcl::from(attrs.acl.as_str()));
        if let Some(ct) = &attrs.content_type {
            req = req.content_type(ct);
        }
        if let Some(cd) = &attrs.content_disposition {
            req = req.content_disposition(cd);
        }
        if let Some(cc) = &attrs.cache_control {
            req = req.cache_control(cc);
        }
        if let Some(exp) = attrs.expires {
            req = req.expires(SdkDateTime::from_secs(exp.timestamp()));
        }
        if !attrs.metadata.is_empty() {
            req = req.set_metadata(Some(attrs.metadata.clone()));
        }
        req
    }};
}

pub struct S3ObjectStore {
    config: ClientConfig,
    client: OnceCell<Client>,
}

impl S3ObjectStore {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client: OnceCell::const_new(),
        }
    }

    /// Get (or build once) the SDK client.
    async fn client(&self) -> Result<Client> {
        let client = self
            .client
            .get_or_try_init(|| build_client(&self.config))
            .await?;
        Ok(client.clone())
    }

    /// Location of an object written through a plain PutObject.
    fn object_location(&self, bucket: &str, key: &str) -> String {
        match &self.config.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.config.region, key),
        }
    }

    async fn put_multipart(
        &self,
        client: &Client,
        bucket: &str,
        key: &str,
        first: Vec<u8>,
        body: Body,
        attrs: &PutAttributes,
    ) -> Result<String> {
        let create = apply_attributes!(client.create_multipart_upload().bucket(bucket).key(key), attrs)
            .send()
            .await
            .map_err(|e| S3Error::transfer("CreateMultipartUpload", bucket, key, DisplayErrorContext(&e)))?;
        let upload_id = create.upload_id().unwrap_or_default().to_string();
        if upload_id.is_empty() {
            return Err(S3Error::transfer("CreateMultipartUpload", bucket, key, "empty upload id"));
        }

        match self.upload_parts(client, bucket, key, &upload_id, first, body).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder().set_parts(Some(parts)).build();
                let resp = client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| S3Error::transfer("CompleteMultipartUpload", bucket, key, DisplayErrorContext(&e)))?;
                Ok(resp
                    .location()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.object_location(bucket, key)))
            }
            Err(e) => {
                // Best effort; the part failure is what the caller needs
                if let Err(abort) = client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!("abort of multipart upload s3://{}/{} failed: {}", bucket, key, DisplayErrorContext(&abort));
                }
                Err(e)
            }
        }
    }

    /// Read `body` part by part and upload each with at most
    /// `parts_in_flight` requests outstanding. Parts come back sorted.
    async fn upload_parts(
        &self,
        client: &Client,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Vec<u8>,
        mut body: Body,
    ) -> Result<Vec<CompletedPart>> {
        let part_size = self.config.multipart_part_size;
        let sem = Arc::new(Semaphore::new(self.config.parts_in_flight));
        let mut tasks = FuturesUnordered::new();

        let outcome = async {
            let mut part_number: i32 = 1;
            let mut chunk = first;
            loop {
                let last = chunk.len() < part_size;
                if !chunk.is_empty() {
                    let permit = sem
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| S3Error::transfer("UploadPart", bucket, key, e))?;
                    let client = client.clone();
                    let (bucket, key, upload_id) = (bucket.to_string(), key.to_string(), upload_id.to_string());
                    let number = part_number;
                    debug!("scheduling part {} ({} bytes) of s3://{}/{}", number, chunk.len(), bucket, key);

                    tasks.push(tokio::spawn(async move {
                        let _permit = permit;
                        let resp = client
                            .upload_part()
                            .bucket(&bucket)
                            .key(&key)
                            .upload_id(upload_id)
                            .part_number(number)
                            .body(ByteStream::from(chunk))
                            .send()
                            .await
                            .map_err(|e| S3Error::transfer("UploadPart", &bucket, &key, DisplayErrorContext(&e)))?;
                        let etag = resp.e_tag().unwrap_or_default().to_string();
                        if etag.is_empty() {
                            return Err(S3Error::transfer("UploadPart", bucket, key, "empty ETag"));
                        }
                        Ok::<_, S3Error>(CompletedPart::builder().part_number(number).e_tag(etag).build())
                    }));
                    part_number += 1;
                }
                if last {
                    break;
                }
                chunk = read_part(&mut body, part_size)
                    .await
                    .map_err(|e| S3Error::transfer("UploadPart", bucket, key, e))?;
            }

            let mut parts = Vec::with_capacity(tasks.len());
            while let Some(joined) = tasks.next().await {
                let part = joined.map_err(|e| S3Error::transfer("UploadPart", bucket, key, e))??;
                parts.push(part);
            }
            Ok::<_, S3Error>(parts)
        }
        .await;

        let mut parts = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                cancel_pending(&mut tasks).await;
                return Err(e);
            }
        };
        parts.sort_by_key(|p| p.part_number());
        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bucket: &str, key: &str, mut body: Body, attrs: &PutAttributes) -> Result<String> {
        let client = self.client().await?;
        let part_size = self.config.multipart_part_size;

        let first = read_part(&mut body, part_size)
            .await
            .map_err(|e| S3Error::transfer("PUT", bucket, key, e))?;

        if first.len() < part_size {
            apply_attributes!(client.put_object().bucket(bucket).key(key), attrs)
                .body(ByteStream::from(first))
                .send()
                .await
                .map_err(|e| S3Error::transfer("PUT", bucket, key, DisplayErrorContext(&e)))?;
            return Ok(self.object_location(bucket, key));
        }

        self.put_multipart(&client, bucket, key, first, body, attrs).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let client = self.client().await?;
        let resp = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3Error::transfer("GET", bucket, key, DisplayErrorContext(&e)))?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| S3Error::transfer("GET", bucket, key, e))?
            .into_bytes();
        Ok(data)
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let client = self.client().await?;
        match client.head_object().bucket(bucket).key(key).send().await {
            Ok(out) => Ok(ObjectHead {
                size: out.content_length().unwrap_or(0).max(0) as u64,
                content_type: out.content_type().map(str::to_string),
                e_tag: out.e_tag().map(str::to_string),
            }),
            Err(e) => {
                // HEAD carries no body, so a missing key may only show up as a bare 404
                let missing = e.as_service_error().is_some_and(|se| se.is_not_found())
                    || e.raw_response().is_some_and(|r| r.status().as_u16() == 404);
                if missing {
                    Err(S3Error::not_found(bucket, key))
                } else {
                    Err(S3Error::transfer("HEAD", bucket, key, DisplayErrorContext(&e)))
                }
            }
        }
    }
}

async fn build_client(config: &ClientConfig) -> Result<Client> {
    if !config.has_credentials() {
        return Err(S3Error::Session("missing access key or secret key".to_string()));
    }

    let credentials = Credentials::new(&config.access_key, &config.secret_key, None, None, "s3batch");
    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .operation_timeout(config.operation_timeout)
        .build();

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .timeout_config(timeout_config);
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(config.force_path_style)
        .build();
    debug!("built S3 client for region {}", config.region);
    Ok(Client::from_conf(s3_config))
}

/// Abort every spawned task still in `tasks` and wait until all of them
/// have stopped, so nothing keeps writing once the caller gives up.
async fn cancel_pending<T>(tasks: &mut FuturesUnordered<JoinHandle<T>>) {
    for task in tasks.iter() {
        task.abort();
    }
    while tasks.next().await.is_some() {}
}

/// Read up to `part_size` bytes; a short read means the body is exhausted.
pub(crate) async fn read_part(body: &mut Body, part_size: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(part_size.min(1024 * 1024));
    body.as_mut().take(part_size as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}
