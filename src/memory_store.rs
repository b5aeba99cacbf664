// src/memory_store.rs
//
// In-process ObjectStore. Objects live in a map keyed by (bucket, key);
// useful for tests and dry runs of the batch orchestration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::error::{Result, S3Error};
use crate::object_store::{Body, ObjectHead, ObjectStore, PutAttributes};

/// An object as stored by [`MemoryObjectStore`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub attrs: PutAttributes,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location string returned by `put` for this backend.
    pub fn location(bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, key)
    }

    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let object = StoredObject {
            data: data.into(),
            attrs: PutAttributes::default(),
        };
        self.with_objects(|objects| {
            objects.insert((bucket.to_string(), key.to_string()), object);
        });
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.with_objects(|objects| objects.get(&(bucket.to_string(), key.to_string())).cloned())
    }

    /// Sorted `bucket/key` listing.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> =
            self.with_objects(|objects| objects.keys().map(|(b, k)| format!("{}/{}", b, k)).collect());
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.with_objects(|objects| objects.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned map still holds consistent entries; keep serving it.
    fn with_objects<R>(&self, f: impl FnOnce(&mut HashMap<(String, String), StoredObject>) -> R) -> R {
        let mut guard = match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, mut body: Body, attrs: &PutAttributes) -> Result<String> {
        if bucket.is_empty() {
            return Err(S3Error::transfer("PUT", bucket, key, "bucket name is empty"));
        }
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|e| S3Error::transfer("PUT", bucket, key, e))?;

        let object = StoredObject {
            data: Bytes::from(data),
            attrs: attrs.clone(),
        };
        self.with_objects(|objects| {
            objects.insert((bucket.to_string(), key.to_string()), object);
        });
        Ok(Self::location(bucket, key))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.object(bucket, key)
            .map(|o| o.data)
            .ok_or_else(|| S3Error::transfer("GET", bucket, key, "NoSuchKey"))
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let object = self
            .object(bucket, key)
            .ok_or_else(|| S3Error::not_found(bucket, key))?;
        Ok(ObjectHead {
            size: object.data.len() as u64,
            content_type: object.attrs.content_type.clone(),
            e_tag: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::body_from_bytes;

    #[tokio::test]
    async fn put_get_head() {
        let store = MemoryObjectStore::new();
        let attrs = PutAttributes {
            content_type: Some("text/plain".into()),
            ..Default::default()
        };
        let loc = store
            .put("bkt", "dir/a.txt", body_from_bytes("abc"), &attrs)
            .await
            .unwrap();
        assert_eq!(loc, "memory://bkt/dir/a.txt");
        assert_eq!(store.get("bkt", "dir/a.txt").await.unwrap(), Bytes::from("abc"));

        let head = store.head("bkt", "dir/a.txt").await.unwrap();
        assert_eq!(head.size, 3);
        assert_eq!(head.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn head_missing_is_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.head("bkt", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_missing_is_transfer_error() {
        let store = MemoryObjectStore::new();
        let err = store.get("bkt", "nope").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transfer);
    }

    #[test]
    fn keys_are_sorted() {
        let store = MemoryObjectStore::new();
        store.insert("b", "z", "1");
        store.insert("a", "y", "2");
        assert_eq!(store.keys(), vec!["a/y".to_string(), "b/z".to_string()]);
        assert_eq!(store.len(), 2);
    }
}
