//! Error types for listing page retrieval.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while fetching or parsing one listing page.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing page request failed.
    #[error("failed to fetch listing: {source}")]
    Request {
        /// The underlying request error.
        #[source]
        source: DownloadError,
    },

    /// The page was fetched but contains no listing table.
    #[error(
        "no listing table found at {url}\n  Suggestion: the session may have expired; refresh the cookies"
    )]
    MissingTable {
        /// The listing URL.
        url: String,
    },
}

impl ListingError {
    /// Wraps a request error.
    #[must_use]
    pub fn request(source: DownloadError) -> Self {
        Self::Request { source }
    }

    /// Creates a missing-table error.
    #[must_use]
    pub fn missing_table(url: &str) -> Self {
        Self::MissingTable {
            url: url.to_string(),
        }
    }
}
