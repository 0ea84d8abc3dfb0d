//! Course Sync Library
//!
//! Mirrors the resource folders of one or more courses, served as
//! directory-style listing pages, onto the local filesystem. Only files that
//! are new or whose size changed are downloaded; user-supplied patterns
//! exclude files by name.
//!
//! # Architecture
//!
//! Data flows through the modules in this order:
//! - [`listing`] - parses one listing page into file and directory entries
//! - [`crawl`] - walks listing pages recursively into a [`ResourceTree`]
//! - [`sync`] - diffs trees against disk, applies the blacklist, and
//!   orchestrates several courses
//! - [`download`] - shared HTTP client and the bounded-parallel
//!   [`DownloadScheduler`]

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crawl;
pub mod download;
pub mod listing;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use crawl::{CrawlError, CrawlFailure, Crawler, ResourceTree};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadError, DownloadScheduler, HttpClient, NoopProgress,
    ProgressEvent, ProgressSink, RunReport, SchedulerError, SchedulerStats, TaskOutcome,
    format_progress_line,
};
pub use listing::{FileEntry, Listing, ListingError, RemoteEntry, parse_listing};
pub use sync::{
    Blacklist, BlacklistError, Course, DEFAULT_CRAWL_CONCURRENCY, DownloadTask, SyncError,
    SyncOrchestrator, SyncPlan, SyncReport, diff,
};
