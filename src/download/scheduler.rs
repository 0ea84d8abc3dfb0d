//! Bounded-parallel execution of download tasks.
//!
//! The [`DownloadScheduler`] runs a list of [`DownloadTask`]s with at most
//! `concurrency` transfers in flight. Each transfer runs in its own Tokio
//! task holding one semaphore permit. Results come back in input order, one
//! per task, so callers can attribute them without extra bookkeeping.
//!
//! # Cancellation
//!
//! Setting the interrupt flag stops the scheduler from starting new
//! transfers. Transfers already started always run to completion (success
//! or failure); tasks never started are reported as
//! [`TaskOutcome::Cancelled`].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::client::header_content_length;
use super::constants::COPY_CHUNK_BYTES;
use super::progress::{ProgressEvent, ProgressSink, RateMeter};
use super::{DownloadError, HttpClient};
use crate::sync::DownloadTask;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of parallel transfers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// How often a permit wait re-checks the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Error type for scheduler construction.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// What happened to one task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The file was written completely.
    Completed {
        /// Bytes written.
        bytes: u64,
    },
    /// The transfer failed; any partial file was removed.
    Failed(DownloadError),
    /// The task was never started because the run was interrupted.
    Cancelled,
}

impl TaskOutcome {
    /// True for [`TaskOutcome::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// A task paired with its outcome.
#[derive(Debug)]
pub struct TaskResult {
    /// The task as submitted.
    pub task: DownloadTask,
    /// Its outcome.
    pub outcome: TaskOutcome,
}

/// Live counters for one scheduler run.
///
/// Updated atomically by the transfer tasks.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    bytes: AtomicU64,
}

impl SchedulerStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of completed transfers.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed transfers.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks never started.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the bytes written by completed transfers.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Returns completed + failed + cancelled.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.cancelled()
    }

    fn record_completed(&self, bytes: u64) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Result of [`DownloadScheduler::run`].
#[derive(Debug)]
pub struct RunReport {
    /// One entry per submitted task, in submission order.
    pub results: Vec<TaskResult>,
    /// Aggregate counters.
    pub stats: SchedulerStats,
}

impl RunReport {
    /// True when the run was cut short by an interrupt.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.stats.cancelled() > 0
    }
}

/// Runs download tasks with bounded parallelism.
#[derive(Debug, Clone)]
pub struct DownloadScheduler {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl DownloadScheduler {
    /// Creates a scheduler running at most `concurrency` transfers at once.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if the value is
    /// outside the valid range (1-100).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download scheduler");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Executes `tasks`, reporting transfer progress to `progress`.
    ///
    /// A failing task never affects the others. The returned report holds
    /// exactly one result per task, in input order.
    #[instrument(skip_all, fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        client: &HttpClient,
        tasks: Vec<DownloadTask>,
        progress: Arc<dyn ProgressSink>,
        interrupted: Arc<AtomicBool>,
    ) -> RunReport {
        let stats = Arc::new(SchedulerStats::new());
        let mut handles: Vec<JoinHandle<Result<u64, DownloadError>>> =
            Vec::with_capacity(tasks.len());

        info!("starting transfers");

        for task in &tasks {
            if interrupted.load(Ordering::SeqCst) {
                break;
            }

            // Race the permit against the interrupt flag so Ctrl+C during a
            // full-concurrency wait stops scheduling immediately.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => None,
                result = Arc::clone(&self.semaphore).acquire_owned() => result.ok(),
            };
            let Some(permit) = permit else {
                break;
            };

            let client = client.clone();
            let task = task.clone();
            let progress = Arc::clone(&progress);
            let stats = Arc::clone(&stats);

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                let result = transfer(&client, &task, progress.as_ref()).await;
                match &result {
                    Ok(bytes) => {
                        info!(path = %task.local_path.display(), bytes, "download completed");
                        stats.record_completed(*bytes);
                    }
                    Err(e) => {
                        warn!(url = %task.remote_url, error = %e, "download failed");
                        stats.increment_failed();
                    }
                }
                result
            }));
        }

        debug!(
            started = handles.len(),
            "waiting for transfers to complete"
        );

        let mut handles = handles.into_iter();
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = match handles.next() {
                Some(handle) => match handle.await {
                    Ok(Ok(bytes)) => TaskOutcome::Completed { bytes },
                    Ok(Err(e)) => TaskOutcome::Failed(e),
                    Err(e) => {
                        warn!(url = %task.remote_url, error = %e, "download task panicked");
                        stats.increment_failed();
                        TaskOutcome::Failed(DownloadError::task_aborted(
                            task.remote_url.clone(),
                            e.to_string(),
                        ))
                    }
                },
                None => {
                    stats.increment_cancelled();
                    TaskOutcome::Cancelled
                }
            };
            results.push(TaskResult { task, outcome });
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            cancelled = stats.cancelled(),
            bytes = stats.bytes(),
            "transfers complete"
        );

        // Every spawned task has been joined, so this is the last reference.
        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| {
            let copy = SchedulerStats::new();
            copy.completed.store(shared.completed(), Ordering::SeqCst);
            copy.failed.store(shared.failed(), Ordering::SeqCst);
            copy.cancelled.store(shared.cancelled(), Ordering::SeqCst);
            copy.bytes.store(shared.bytes(), Ordering::SeqCst);
            copy
        });

        RunReport { results, stats }
    }
}

async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

/// Streams one remote file to its local path.
///
/// Returns the number of bytes written. On failure after the file was
/// created, the partial file is removed so the next run sees it as missing.
#[instrument(skip_all, fields(url = %task.remote_url, path = %task.local_path.display()))]
async fn transfer(
    client: &HttpClient,
    task: &DownloadTask,
    progress: &dyn ProgressSink,
) -> Result<u64, DownloadError> {
    ensure_parent_dir(&task.local_path).await?;

    let response = client.open_stream(&task.remote_url).await?;
    let total_bytes = header_content_length(&response);

    let file = tokio::fs::File::create(&task.local_path)
        .await
        .map_err(|e| DownloadError::io(&task.local_path, e))?;

    let result = write_body(response, file, task, total_bytes, progress).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&task.local_path).await {
            debug!(path = %task.local_path.display(), error = %e, "could not remove partial file");
        }
        progress.on_failed(&task.local_path);
    }
    result
}

async fn ensure_parent_dir(path: &Path) -> Result<(), DownloadError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    match tokio::fs::create_dir_all(parent).await {
        Ok(()) => Ok(()),
        // A concurrent worker may have created it between checks.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
        Err(e) => Err(DownloadError::create_dir(parent, e)),
    }
}

async fn write_body(
    mut response: reqwest::Response,
    mut file: tokio::fs::File,
    task: &DownloadTask,
    total_bytes: Option<u64>,
    progress: &dyn ProgressSink,
) -> Result<u64, DownloadError> {
    let mut meter = RateMeter::start();
    let mut bytes_so_far = 0u64;
    let mut smoothed_rate = 0.0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| DownloadError::from_request(task.remote_url.clone(), e))?
    {
        for (piece, rate, smoothed) in chunk_pieces(&chunk, &mut meter, Instant::now()) {
            file.write_all(piece)
                .await
                .map_err(|e| DownloadError::io(&task.local_path, e))?;

            let chunk_bytes = piece.len() as u64;
            bytes_so_far += chunk_bytes;
            smoothed_rate = smoothed;
            progress.on_progress(&ProgressEvent {
                local_path: task.local_path.clone(),
                total_bytes,
                bytes_so_far,
                chunk_bytes,
                rate,
                smoothed_rate,
            });
        }
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::io(&task.local_path, e))?;
    drop(file);

    finish_body(task, total_bytes, bytes_so_far, smoothed_rate, progress)
}

/// Splits one network chunk into write pieces. The chunk is timed once and
/// every piece carries its rate.
fn chunk_pieces<'a>(
    chunk: &'a [u8],
    meter: &mut RateMeter,
    now: Instant,
) -> impl Iterator<Item = (&'a [u8], f64, f64)> + 'a {
    let (rate, smoothed) = meter.record(chunk.len() as u64, now);
    chunk
        .chunks(COPY_CHUNK_BYTES)
        .map(move |piece| (piece, rate, smoothed))
}

/// Checks the written length against `Content-Length`, then emits the final
/// event. A short or long body emits nothing.
fn finish_body(
    task: &DownloadTask,
    total_bytes: Option<u64>,
    bytes_so_far: u64,
    smoothed_rate: f64,
    progress: &dyn ProgressSink,
) -> Result<u64, DownloadError> {
    if let Some(expected) = total_bytes
        && expected != bytes_so_far
    {
        return Err(DownloadError::integrity(
            &task.local_path,
            expected,
            bytes_so_far,
        ));
    }

    progress.on_progress(&ProgressEvent {
        local_path: task.local_path.clone(),
        total_bytes,
        bytes_so_far,
        chunk_bytes: 0,
        rate: 0.0,
        smoothed_rate,
    });
    Ok(bytes_so_far)
}
