//! Transfer progress events and the sink they are delivered to.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::constants::{MIN_RATE_ELAPSED_SECS, RATE_WINDOW};

/// One progress observation for a single transfer.
///
/// Emitted after every written chunk and once more with `chunk_bytes == 0`
/// after the body has been fully written and its length checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Destination of the transfer.
    pub local_path: PathBuf,
    /// Advertised body length, when the server sent one.
    pub total_bytes: Option<u64>,
    /// Bytes written so far.
    pub bytes_so_far: u64,
    /// Bytes in the chunk this event reports (0 for the final event).
    pub chunk_bytes: u64,
    /// `chunk_bytes` divided by the time since the previous chunk, bytes/s.
    pub rate: f64,
    /// Short moving average of `rate`, bytes/s.
    pub smoothed_rate: f64,
}

impl ProgressEvent {
    /// True for the end-of-stream event.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.chunk_bytes == 0
    }

    /// Completion percentage, when the total is known and non-zero.
    #[must_use]
    pub fn percent(&self) -> Option<u64> {
        match self.total_bytes {
            Some(total) if total > 0 => Some(self.bytes_so_far.saturating_mul(100) / total),
            _ => None,
        }
    }
}

/// Receiver of progress events.
///
/// Called synchronously from whichever worker is transferring, possibly from
/// several workers at once; implementations must synchronize any state they
/// keep.
pub trait ProgressSink: Send + Sync {
    /// Handles one progress event.
    fn on_progress(&self, event: &ProgressEvent);

    /// Called instead of the final event when a started transfer fails and
    /// its partial file is removed.
    fn on_failed(&self, _local_path: &Path) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Per-transfer rate tracker.
#[derive(Debug)]
pub struct RateMeter {
    last_tick: Instant,
    samples: VecDeque<f64>,
}

impl RateMeter {
    /// Starts measuring from now.
    #[must_use]
    pub fn start() -> Self {
        Self::start_at(Instant::now())
    }

    /// Starts measuring from `now`.
    #[must_use]
    pub fn start_at(now: Instant) -> Self {
        Self {
            last_tick: now,
            samples: VecDeque::with_capacity(RATE_WINDOW),
        }
    }

    /// Records a chunk observed at `now`; returns `(instantaneous, smoothed)`.
    pub fn record(&mut self, chunk_bytes: u64, now: Instant) -> (f64, f64) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        let rate = instantaneous_rate(chunk_bytes, elapsed);

        if self.samples.len() == RATE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(rate);
        #[allow(clippy::cast_precision_loss)]
        let smoothed = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        (rate, smoothed)
    }
}

/// `chunk_bytes / elapsed`, with the elapsed time floored so a chunk that
/// arrives "instantly" does not divide by zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn instantaneous_rate(chunk_bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(MIN_RATE_ELAPSED_SECS);
    chunk_bytes as f64 / secs
}

/// Formats an event as `name(pct%): xKB/yKB zKB/s`.
///
/// The percentage is `?` when the server did not advertise a length.
#[must_use]
pub fn format_progress_line(event: &ProgressEvent) -> String {
    let name = file_name_lossy(&event.local_path);
    let percent = event
        .percent()
        .map_or_else(|| "?".to_string(), |p| p.to_string());
    let total_kb = event
        .total_bytes
        .map_or_else(|| "?".to_string(), |t| (t / 1024).to_string());
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rate_kb = (event.rate / 1024.0) as u64;
    format!(
        "{name}({percent}%): {}KB/{total_kb}KB {rate_kb}KB/s",
        event.bytes_so_far / 1024
    )
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
