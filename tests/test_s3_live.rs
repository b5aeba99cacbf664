// tests/test_s3_live.rs
//
// Round trip against a real bucket. Needs AWS_ACCESS_KEY_ID,
// AWS_SECRET_ACCESS_KEY, S3BATCH_TEST_BUCKET and optionally AWS_ENDPOINT_URL
// (e.g. a local MinIO). Run with `cargo test -- --ignored`.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use s3batch::{body_from_bytes, Client, ClientConfig, DownloadRequest, ErrorKind, UploadRequest};

fn unique(prefix: &str) -> String {
    let pid = std::process::id();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    format!("s3batch-{}-{}-{}", prefix, pid, now)
}

#[tokio::test]
#[ignore]
async fn live_upload_download_exists() -> Result<()> {
    s3batch::init_tracing(1);
    let bucket = std::env::var("S3BATCH_TEST_BUCKET").context("S3BATCH_TEST_BUCKET not set")?;
    let client = Client::new(ClientConfig::from_env().with_multipart_part_size(5 * 1024 * 1024));
    let prefix = unique("live");

    // Second object crosses the multipart threshold
    let small = b"hello from s3batch".to_vec();
    let large = vec![0xABu8; 11 * 1024 * 1024];
    let report = client
        .upload_many(vec![
            UploadRequest::new(&bucket, format!("{prefix}/small.txt"), body_from_bytes(small.clone())).acl("private"),
            UploadRequest::new(&bucket, format!("{prefix}/large.bin"), body_from_bytes(large.clone())).acl("private"),
        ])
        .await;
    report.into_strict()?;

    let downloads = client
        .download_many(vec![
            DownloadRequest::new(&bucket, format!("{prefix}/small.txt")),
            DownloadRequest::new(&bucket, format!("{prefix}/large.bin")),
        ])
        .await
        .into_strict()?;
    for object in downloads {
        let expected = if object.key.ends_with("small.txt") { &small } else { &large };
        assert_eq!(&object.data[..], &expected[..], "{}", object.key);
    }

    client.check_exists(&bucket, &format!("{prefix}/small.txt")).await?;
    let err = client
        .check_exists(&bucket, &format!("{prefix}/absent"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}
