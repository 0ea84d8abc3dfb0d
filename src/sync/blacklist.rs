//! File-name blacklist.
//!
//! Patterns are regular expressions matched anywhere in the local file name
//! (not the full path). A task is dropped when any pattern matches.

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::DownloadTask;

/// Errors raised while compiling blacklist patterns.
#[derive(Debug, Error)]
pub enum BlacklistError {
    /// A pattern is not a valid regular expression.
    #[error("invalid blacklist pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },
}

/// Compiled set of exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    /// Compiles `patterns`. An empty list blocks nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BlacklistError::InvalidPattern`] for the first pattern that
    /// fails to compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, BlacklistError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let pattern = p.as_ref();
                Regex::new(pattern).map_err(|source| BlacklistError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True when no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when any pattern matches somewhere in `file_name`.
    #[must_use]
    pub fn is_blocked(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(file_name))
    }

    /// Keeps the tasks whose file name no pattern matches, preserving order.
    #[must_use]
    pub fn filter(&self, tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
        self.partition(tasks).0
    }

    /// Splits tasks into `(kept, blocked)`, both in input order.
    #[must_use]
    pub fn partition(&self, tasks: Vec<DownloadTask>) -> (Vec<DownloadTask>, Vec<DownloadTask>) {
        if self.is_empty() {
            return (tasks, Vec::new());
        }
        let (blocked, kept): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .partition(|task| self.is_blocked(&task.file_name()));
        for task in &blocked {
            debug!(path = %task.local_path.display(), "blacklisted");
        }
        (kept, blocked)
    }
}
