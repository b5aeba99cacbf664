// src/log_upload.rs
//
// Gzip-and-upload of every log file under a directory.
//
// Each file is compressed by a background task that feeds the upload through
// a small bounded channel, so compression and transfer overlap and no file
// is held in memory whole.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::batch::{BatchReport, Job};
use crate::constants::{GZIP_PIPE_DEPTH, GZIP_READ_CHUNK, LOG_ARCHIVE_EXTENSION};
use crate::error::{Result, S3Error};
use crate::logger::Level;
use crate::object_store::Body;
use crate::upload::{UploadOrchestrator, UploadRequest};

type KeepPredicate = dyn Fn(&str, &str) -> bool + Send + Sync;

/// What happens to a local file after its upload succeeded.
#[derive(Clone, Default)]
pub enum Retention {
    #[default]
    KeepAll,
    DeleteAll,
    /// Called with `(object key, file name)`; `true` keeps the file.
    Custom(Arc<KeepPredicate>),
}

impl Retention {
    pub fn custom<F>(keep: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Retention::Custom(Arc::new(keep))
    }

    pub fn keeps(&self, key: &str, file_name: &str) -> bool {
        match self {
            Retention::KeepAll => true,
            Retention::DeleteAll => false,
            Retention::Custom(keep) => keep(key, file_name),
        }
    }
}

impl fmt::Debug for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retention::KeepAll => f.write_str("KeepAll"),
            Retention::DeleteAll => f.write_str("DeleteAll"),
            Retention::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogUploadRequest {
    pub source_dir: PathBuf,
    pub bucket: String,
    /// Files whose path contains any of these substrings are skipped.
    pub ignore: Vec<String>,
    pub retention: Retention,
}

impl LogUploadRequest {
    pub fn new(source_dir: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            source_dir: source_dir.into(),
            bucket: bucket.into(),
            ignore: Vec::new(),
            retention: Retention::default(),
        }
    }

    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }
}

#[derive(Debug)]
pub struct LogUploadReport {
    /// Every file that was scanned and attempted.
    pub files: Vec<PathBuf>,
    pub report: BatchReport<String>,
}

/// Recursively collect non-empty files under `dir`, skipping any whose path
/// contains one of the `ignore` substrings. Output is sorted by path.
pub fn collect_log_files(dir: &Path, ignore: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| S3Error::Walk {
            dir: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|e| S3Error::Walk {
                dir: dir.to_path_buf(),
                message: e.to_string(),
            })?
            .len();
        if size == 0 {
            continue;
        }
        let path = entry.path().to_string_lossy();
        if ignore.iter().any(|pattern| !pattern.is_empty() && path.contains(pattern.as_str())) {
            debug!("ignoring {}", path);
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Object key and file name for a log file: the extension is replaced by
/// `.gz` and the directory part is kept, e.g. `logs/backend/app.log` →
/// `logs/backend/app.gz`. Root and `.` components are dropped.
pub fn derive_log_key(path: &Path) -> (String, String) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let dir: Vec<String> = path
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    Component::ParentDir => Some("..".to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let object = format!("{}.{}", stem, LOG_ARCHIVE_EXTENSION);
    let key = if dir.is_empty() {
        object
    } else {
        format!("{}/{}", dir.join("/"), object)
    };
    (key, file_name)
}

/// Gzip `source` on a background task and expose the compressed bytes as a
/// streaming [`Body`]. Read or compression errors reach the consumer as I/O
/// errors instead of a silently truncated stream.
pub fn gzip_stream(source: File) -> Body {
    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(GZIP_PIPE_DEPTH);
    tokio::spawn(pump_gzip(source, tx));
    Box::pin(StreamReader::new(ReceiverStream::new(rx)))
}

async fn pump_gzip(mut source: File, tx: mpsc::Sender<std::io::Result<Bytes>>) {
    let mut encoder = GzEncoder::new(Vec::with_capacity(GZIP_READ_CHUNK), Compression::default());
    let mut buf = vec![0u8; GZIP_READ_CHUNK];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        if let Err(e) = encoder.write_all(&buf[..n]) {
            let _ = tx.send(Err(e)).await;
            return;
        }
        let pending = encoder.get_mut();
        if !pending.is_empty() {
            let chunk = Bytes::from(std::mem::take(pending));
            if tx.send(Ok(chunk)).await.is_err() {
                // Upload side gave up
                return;
            }
        }
    }

    let tail = encoder.finish().map(Bytes::from);
    let _ = tx.send(tail).await;
}

impl UploadOrchestrator {
    /// Compress and upload every matching file under `request.source_dir`.
    ///
    /// Fails with [`S3Error::NoFiles`] when nothing matches and with a walk
    /// error when the directory cannot be read. Per-file failures are logged
    /// and reported in the returned batch report; the file is then kept
    /// regardless of the retention policy. Files whose keys collide are
    /// neither uploaded nor deleted and fail with [`S3Error::InvalidRequest`].
    pub async fn upload_log_directory(&self, request: LogUploadRequest) -> Result<LogUploadReport> {
        let LogUploadRequest {
            source_dir,
            bucket,
            ignore,
            retention,
        } = request;

        let walk_dir = source_dir.clone();
        let files = tokio::task::spawn_blocking(move || collect_log_files(&walk_dir, &ignore))
            .await
            .map_err(|e| S3Error::Walk {
                dir: source_dir.clone(),
                message: e.to_string(),
            })??;

        if files.is_empty() {
            return Err(S3Error::NoFiles { dir: source_dir });
        }
        info!("Uploading {} log file(s) from {} to {}", files.len(), source_dir.display(), bucket);

        // Files differing only by extension map to the same key
        let derived: Vec<(String, String)> = files.iter().map(|path| derive_log_key(path)).collect();
        let mut claims: HashMap<&str, usize> = HashMap::new();
        for (key, _) in &derived {
            *claims.entry(key.as_str()).or_default() += 1;
        }
        let colliding: Vec<bool> = derived.iter().map(|(key, _)| claims[key.as_str()] > 1).collect();

        let retention = Arc::new(retention);
        let jobs = files
            .iter()
            .zip(derived)
            .zip(colliding)
            .map(|((path, (key, file_name)), collides)| {
                let path = path.clone();
                let bucket = bucket.clone();
                let retention = retention.clone();
                let this = self.clone();
                Job::new(key.clone(), async move {
                    if collides {
                        let message = format!("Upload {}: key {} is derived from more than one file", path.display(), key);
                        this.sink.emit(Level::ERROR, &message);
                        return Err(S3Error::InvalidRequest(message));
                    }

                    let file = match File::open(&path).await {
                        Ok(file) => file,
                        Err(e) => {
                            this.sink.emit(Level::ERROR, &format!("Open file {}: error {}", path.display(), e));
                            return Err(S3Error::io(path.display().to_string(), e));
                        }
                    };

                    let location = this
                        .upload_one(UploadRequest::new(bucket, key.clone(), gzip_stream(file)))
                        .await?;
                    if location.is_empty() {
                        return Ok(None);
                    }

                    if !retention.keeps(&key, &file_name) {
                        match tokio::fs::remove_file(&path).await {
                            Ok(()) => debug!("removed {} after upload", path.display()),
                            Err(e) => this.sink.emit(
                                Level::WARN,
                                &format!("Remove {} after upload: error {}", path.display(), e),
                            ),
                        }
                    }
                    Ok(Some(location))
                })
            })
            .collect();

        let report = self.runner.run("log upload", jobs).await;
        Ok(LogUploadReport { files, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn key_replaces_extension_and_keeps_dirs() {
        let (key, name) = derive_log_key(Path::new("logs/backend/app.log"));
        assert_eq!(key, "logs/backend/app.gz");
        assert_eq!(name, "app.log");
    }

    #[test]
    fn key_without_extension_gets_suffix() {
        let (key, name) = derive_log_key(Path::new("./logs/backend/2006-01-02"));
        assert_eq!(key, "logs/backend/2006-01-02.gz");
        assert_eq!(name, "2006-01-02");
    }

    #[test]
    fn key_only_strips_last_extension() {
        let (key, _) = derive_log_key(Path::new("logs/app.2022-04-18.log"));
        assert_eq!(key, "logs/app.2022-04-18.gz");
    }

    #[test]
    fn key_for_bare_and_absolute_paths() {
        assert_eq!(derive_log_key(Path::new("app.log")).0, "app.gz");
        assert_eq!(derive_log_key(Path::new("/var/log/app.log")).0, "var/log/app.gz");
    }

    #[test]
    fn retention_policies() {
        assert!(Retention::KeepAll.keeps("k", "f"));
        assert!(!Retention::DeleteAll.keeps("k", "f"));
        let keep_today = Retention::custom(|_, name| name.contains("today"));
        assert!(keep_today.keeps("logs/today.gz", "today.log"));
        assert!(!keep_today.keeps("logs/old.gz", "old.log"));
        assert_eq!(format!("{keep_today:?}"), "Custom(..)");
    }

    #[tokio::test]
    async fn gzip_stream_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        let content: Vec<u8> = (0..300_000u32).flat_map(|i| format!("line {i}\n").into_bytes()).collect();
        std::fs::write(&path, &content).unwrap();

        let mut body = gzip_stream(File::open(&path).await.unwrap());
        let mut compressed = Vec::new();
        body.read_to_end(&mut compressed).await.unwrap();
        assert!(compressed.len() < content.len());

        let mut restored = Vec::new();
        GzDecoder::new(&compressed[..]).read_to_end(&mut restored).unwrap();
        assert_eq!(restored, content);
    }
}
