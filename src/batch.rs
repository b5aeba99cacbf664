// src/batch.rs
//
//! Fan-out/fan-in runner for independent storage jobs.
//!
//! Jobs are fed to a pool of at most `max_in_flight` Tokio tasks. Each task
//! reports its outcome over a channel to a single collector, which builds the
//! [`BatchReport`]. A failing (or panicking) job never stops the others; the
//! batch always runs to completion and nothing is retried.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::error::{Result, S3Error};
use crate::logger::{DiagnosticSink, Level};

/// One unit of work. `Ok(None)` means the job ran but produced nothing
/// worth reporting (for example an empty location); it is skipped.
pub struct Job<T> {
    id: String,
    fut: BoxFuture<'static, Result<Option<T>>>,
}

impl<T> Job<T> {
    pub fn new<F>(id: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        Self {
            id: id.into(),
            fut: Box::pin(fut),
        }
    }
}

#[derive(Debug)]
pub struct JobFailure {
    pub id: String,
    pub error: S3Error,
}

/// Outcome of a batch. Order of `successes` is completion order, not
/// submission order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub successes: Vec<T>,
    pub failures: Vec<JobFailure>,
    /// Ids of jobs that finished without a result.
    pub skipped: Vec<String>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len() + self.skipped.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Strict mode: any failure turns the whole batch into an error.
    pub fn into_strict(self) -> Result<Vec<T>> {
        if self.failures.is_empty() {
            Ok(self.successes)
        } else {
            Err(S3Error::BatchFailed {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

struct JobOutcome<T> {
    id: String,
    result: Result<Option<T>>,
}

#[derive(Clone)]
pub struct BatchRunner {
    max_in_flight: usize,
    sink: Arc<dyn DiagnosticSink>,
}

impl BatchRunner {
    pub fn new(max_in_flight: usize, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            sink,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Run every job and wait for all of them.
    pub async fn run<T>(&self, label: &str, jobs: Vec<Job<T>>) -> BatchReport<T>
    where
        T: Send + 'static,
    {
        if jobs.is_empty() {
            return BatchReport::default();
        }

        let total = jobs.len();
        let workers = self.max_in_flight.min(total);
        info!("Starting {} of {} job(s) (workers={})", label, total, workers);

        let sem = Arc::new(Semaphore::new(workers));
        let (tx, rx) = mpsc::channel::<JobOutcome<T>>(workers);

        // Feeder: a job only starts once a worker slot is free
        let feeder = tokio::spawn(async move {
            for Job { id, fut } in jobs {
                let Ok(permit) = sem.clone().acquire_owned().await else {
                    break;
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    debug!("job {} started", id);
                    let result = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(result) => result,
                        Err(_) => Err(S3Error::JobPanicked { id: id.clone() }),
                    };
                    // Receiver lives until every sender is gone
                    let _ = tx.send(JobOutcome { id, result }).await;
                });
            }
        });

        let mut report = BatchReport {
            successes: Vec::with_capacity(total),
            ..BatchReport::default()
        };
        let mut outcomes = ReceiverStream::new(rx);
        while let Some(JobOutcome { id, result }) = outcomes.next().await {
            match result {
                Ok(Some(value)) => report.successes.push(value),
                Ok(None) => {
                    debug!("job {} produced no result", id);
                    report.skipped.push(id);
                }
                Err(error) => {
                    if matches!(error, S3Error::JobPanicked { .. }) {
                        self.sink.emit(Level::ERROR, &error.to_string());
                    }
                    report.failures.push(JobFailure { id, error });
                }
            }
        }

        if let Err(e) = feeder.await {
            warn!("{} feeder task ended abnormally: {}", label, e);
        }

        if report.failures.is_empty() {
            info!("Finished {}: {}/{} succeeded", label, report.successes.len(), total);
        } else {
            warn!(
                "Finished {}: {} succeeded, {} failed, {} skipped",
                label,
                report.successes.len(),
                report.failures.len(),
                report.skipped.len()
            );
        }
        report
    }
}
