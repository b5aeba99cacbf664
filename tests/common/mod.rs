// tests/common/mod.rs
//
// Shared fixtures for the integration tests: a fault-injecting store and
// client constructors.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use s3batch::{
    Body, Client, ClientConfig, MemoryObjectStore, MemorySink, ObjectHead, ObjectStore,
    PutAttributes, Result, S3Error,
};

/// Wraps a [`MemoryObjectStore`]. Keys containing `fail` error out, keys
/// containing `panic` panic, and every call sleeps for `delay` while the
/// peak number of concurrent calls is recorded.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryObjectStore,
    pub delay: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: &'static str, bucket: &str, key: &str) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if key.contains("panic") {
            panic!("injected panic for {key}");
        }
        if key.contains("fail") {
            return Err(S3Error::transfer(op, bucket, key, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, bucket: &str, key: &str, body: Body, attrs: &PutAttributes) -> Result<String> {
        self.enter("PUT", bucket, key).await?;
        self.inner.put(bucket, key, body, attrs).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.enter("GET", bucket, key).await?;
        self.inner.get(bucket, key).await
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        self.enter("HEAD", bucket, key).await?;
        self.inner.head(bucket, key).await
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new("test-access", "test-secret", "us-east-1")
}

/// Client over `store` whose diagnostics land in the returned sink.
pub fn client_with<S>(store: S, max_in_flight: usize) -> (Client, Arc<MemorySink>)
where
    S: ObjectStore + 'static,
{
    let sink = Arc::new(MemorySink::new());
    let client = Client::builder(config().with_max_in_flight(max_in_flight))
        .store(Arc::new(store))
        .sink(sink.clone())
        .build();
    (client, sink)
}
