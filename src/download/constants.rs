//! Constants for the download module (timeouts, chunking, pool sizes).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Upper bound on bytes written (and reported) per progress step.
pub const COPY_CHUNK_BYTES: usize = 100 * 1024;

/// Floor for the elapsed time used in rate computation (0.1 ms).
pub const MIN_RATE_ELAPSED_SECS: f64 = 0.0001;

/// Number of samples in the smoothed progress rate.
pub const RATE_WINDOW: usize = 8;
