//! [`DownloadError`]: failures of listing fetches, size lookups and
//! transfers.
//!
//! There is no `From<reqwest::Error>` or `From<io::Error>`; every variant
//! carries a URL or a path the source error lacks.

use std::path::PathBuf;

use thiserror::Error;

/// A failed request or a failed local write, tagged with the URL or path
/// involved.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request never got a response (DNS, refused connection, TLS, reset).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport error from reqwest.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The server answered with a non-2xx status. An expired session
    /// usually shows up here as 401/403.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status.
        status: u16,
    },

    /// A listing href or course URL that does not parse.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected text.
        url: String,
    },

    /// Creating, writing or flushing the destination file failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// Destination file.
        path: PathBuf,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The parent directory of a download could not be created.
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The body ended before the advertised content length was received.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Destination file (already removed).
        path: PathBuf,
        /// `Content-Length` of the response.
        expected_bytes: u64,
        /// Bytes actually written.
        actual_bytes: u64,
    },

    /// The worker running the transfer panicked or was aborted.
    #[error("download task for {url} aborted: {reason}")]
    TaskAborted {
        /// URL of the task.
        url: String,
        /// Rendered join error.
        reason: String,
    },
}

impl DownloadError {
    /// Wraps a transport error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Classifies a reqwest error as [`Self::Timeout`] or [`Self::Network`].
    pub fn from_request(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    #[must_use]
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    #[must_use]
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    #[must_use]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Local write failure on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Parent directory creation failure.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    #[must_use]
    pub fn task_aborted(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskAborted {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Stable label used in the summary and the JSON report.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Io { .. } => "io",
            Self::CreateDir { .. } => "create_dir",
            Self::Integrity { .. } => "integrity",
            Self::TaskAborted { .. } => "aborted",
        }
    }
}
