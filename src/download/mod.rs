//! HTTP access and bounded-parallel file transfers.
//!
//! # Features
//!
//! - One shared [`HttpClient`] for listing fetches, size lookups and
//!   streaming transfers, carrying the session cookies
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Structured error types with full context
//! - A [`DownloadScheduler`] running at most N transfers at once, with
//!   per-chunk [`ProgressEvent`]s and cooperative cancellation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use course_sync::download::{DownloadScheduler, HttpClient, NoopProgress};
//! use course_sync::sync::DownloadTask;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = DownloadScheduler::new(4)?;
//! let tasks = vec![DownloadTask::new(
//!     "https://course.example.edu/access/content/group/1234/syllabus.pdf",
//!     "./Algebra/syllabus.pdf",
//! )];
//! let report = scheduler
//!     .run(
//!         &HttpClient::new(),
//!         tasks,
//!         Arc::new(NoopProgress),
//!         Arc::new(AtomicBool::new(false)),
//!     )
//!     .await;
//! println!("completed: {}", report.stats.completed());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod progress;
mod scheduler;

pub use client::HttpClient;
pub use error::DownloadError;
pub use progress::{NoopProgress, ProgressEvent, ProgressSink, format_progress_line};
pub use scheduler::{
    DEFAULT_CONCURRENCY, DownloadScheduler, RunReport, SchedulerError, SchedulerStats,
    TaskOutcome, TaskResult,
};
