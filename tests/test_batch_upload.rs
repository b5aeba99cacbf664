// tests/test_batch_upload.rs

mod common;

use std::time::Duration;

use anyhow::Result;
use s3batch::{body_from_bytes, ErrorKind, MemoryObjectStore, S3Error, UploadRequest};

use common::{client_with, FlakyStore};

fn request(key: &str, data: &'static str) -> UploadRequest {
    UploadRequest::new("bucket", key, body_from_bytes(data))
}

#[tokio::test]
async fn upload_many_returns_every_location() -> Result<()> {
    let store = MemoryObjectStore::new();
    let (client, _) = client_with(store.clone(), 4);

    let requests = (0..20)
        .map(|i| request(&format!("docs/{i}.txt"), "payload"))
        .collect();
    let report = client.upload_many(requests).await;

    assert_eq!(report.successes.len(), 20);
    assert!(report.is_complete_success());
    assert_eq!(store.len(), 20);
    assert!(report.successes.contains(&"memory://bucket/docs/7.txt".to_string()));
    Ok(())
}

#[tokio::test]
async fn failing_jobs_do_not_stop_the_batch() -> Result<()> {
    let store = FlakyStore::new();
    let (client, sink) = client_with(store.clone(), 3);

    let keys = ["a", "fail-1", "b", "c", "fail-2"];
    let requests = keys.iter().map(|k| request(k, "x")).collect();
    let report = client.upload_many(requests).await;

    assert_eq!(report.successes.len(), keys.len() - 2);
    let mut failed = report.failed_ids();
    failed.sort();
    assert_eq!(failed, vec!["s3://bucket/fail-1", "s3://bucket/fail-2"]);
    assert!(report.failures.iter().all(|f| f.error.kind() == ErrorKind::Transfer));

    // Each failure was reported through the sink at the point of failure
    assert!(sink.contains("Upload s3://bucket/fail-1 error"));
    assert!(sink.contains("Upload s3://bucket/fail-2 error"));
    assert_eq!(store.inner.len(), 3);

    assert!(matches!(
        report.into_strict(),
        Err(S3Error::BatchFailed { failed: 2, total: 5 })
    ));
    Ok(())
}

#[tokio::test]
async fn panicking_upload_is_isolated() -> Result<()> {
    let (client, sink) = client_with(FlakyStore::new(), 2);
    let report = client
        .upload_many(vec![request("ok", "1"), request("panic-now", "2"), request("ok-too", "3")])
        .await;

    assert_eq!(report.successes.len(), 2);
    assert_eq!(report.failed_ids(), vec!["s3://bucket/panic-now"]);
    assert_eq!(report.failures[0].error.kind(), ErrorKind::Job);
    assert!(sink.contains("panicked"));
    Ok(())
}

#[tokio::test]
async fn in_flight_uploads_are_bounded() -> Result<()> {
    let store = FlakyStore::with_delay(Duration::from_millis(20));
    let (client, _) = client_with(store.clone(), 4);

    let requests = (0..16).map(|i| request(&format!("k{i}"), "x")).collect();
    let report = client.upload_many(requests).await;

    assert_eq!(report.successes.len(), 16);
    assert!(store.peak() <= 4, "peak {} exceeded limit", store.peak());
    assert!(store.peak() >= 2, "uploads never overlapped");
    Ok(())
}

#[tokio::test]
async fn empty_batch_is_empty_report() -> Result<()> {
    let (client, _) = client_with(MemoryObjectStore::new(), 4);
    let report = client.upload_many(Vec::new()).await;
    assert_eq!(report.total(), 0);
    assert!(report.into_strict()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn upload_one_sets_attributes() -> Result<()> {
    let store = MemoryObjectStore::new();
    let (client, _) = client_with(store.clone(), 1);

    let location = client
        .upload_one(
            UploadRequest::new("bucket", "report.pdf", body_from_bytes("%PDF-1.4 ..."))
                .cache_control("max-age=3600")
                .content_disposition("attachment")
                .metadata("team", "billing"),
        )
        .await?;
    assert_eq!(location, "memory://bucket/report.pdf");

    let stored = store.object("bucket", "report.pdf").expect("object stored");
    assert_eq!(stored.attrs.acl, "public-read");
    assert_eq!(stored.attrs.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(stored.attrs.cache_control.as_deref(), Some("max-age=3600"));
    assert_eq!(stored.attrs.metadata.get("team").map(String::as_str), Some("billing"));
    assert_eq!(&stored.data[..], b"%PDF-1.4 ...");
    Ok(())
}

#[tokio::test]
async fn explicit_content_type_and_acl_win() -> Result<()> {
    let store = MemoryObjectStore::new();
    let (client, _) = client_with(store.clone(), 1);

    client
        .upload_one(
            UploadRequest::new("bucket", "raw", body_from_bytes("%PDF-"))
                .content_type("application/custom")
                .acl("private"),
        )
        .await?;

    let stored = store.object("bucket", "raw").expect("object stored");
    assert_eq!(stored.attrs.content_type.as_deref(), Some("application/custom"));
    assert_eq!(stored.attrs.acl, "private");
    Ok(())
}

#[tokio::test]
async fn upload_one_surfaces_transfer_error() -> Result<()> {
    let (client, sink) = client_with(MemoryObjectStore::new(), 1);
    let err = client
        .upload_one(UploadRequest::new("", "orphan", body_from_bytes("x")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transfer);
    assert!(sink.contains("orphan"));
    Ok(())
}
