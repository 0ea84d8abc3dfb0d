//! Local/remote synchronization: diffing, filtering, and the multi-course
//! orchestrator that ties crawl, diff, filter and download together.

pub mod blacklist;
mod course;
pub mod diff;
mod orchestrator;

use thiserror::Error;

use crate::download::SchedulerError;

pub use blacklist::{Blacklist, BlacklistError};
pub use course::Course;
pub use diff::{DownloadTask, diff, needs_download};
pub use orchestrator::{
    BranchFailure, CourseFailure, CoursePlan, CourseReport, DEFAULT_CRAWL_CONCURRENCY,
    DownloadedFile, FailedDownload, SkippedTask, SyncOrchestrator, SyncPlan, SyncReport,
};

/// Configuration errors detected before any network I/O.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A course argument could not be turned into a listing URL.
    #[error("invalid course '{input}': {reason}")]
    InvalidCourse {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A blacklist pattern failed to compile.
    #[error(transparent)]
    Blacklist(#[from] BlacklistError),

    /// The download worker count is out of range.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The crawl worker count is out of range.
    #[error("invalid crawl concurrency value {value}: must be between 1 and 100")]
    InvalidCrawlConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}
