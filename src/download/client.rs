//! HTTP client wrapper shared by the crawler and the download scheduler.
//!
//! The client carries the session cookies supplied on the command line and
//! is cloned freely: clones share the same connection pool and cookie jar,
//! which are never mutated during a sync.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH};
use reqwest::{Client, Method};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;

/// Authenticated HTTP client supporting the three request shapes the engine
/// needs: listing page fetch, metadata-only size lookup, streaming body read.
///
/// # Example
///
/// ```no_run
/// use course_sync::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let html = client
///     .fetch_text("https://course.example.edu/access/content/group/1234/")
///     .await?;
/// println!("{} bytes of listing", html.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Client without session cookies, using the default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Client that sends the cookies held in `session` with every request.
    #[must_use]
    #[instrument(level = "debug", skip(session))]
    pub fn with_session(session: Arc<Jar>, connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        Self::build(Some(session), connect_timeout_secs, read_timeout_secs)
    }

    // Fails only when the TLS backend cannot initialize.
    #[allow(clippy::expect_used)]
    fn build(session: Option<Arc<Jar>>, connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = build_client(session, connect_timeout_secs, read_timeout_secs)
            .expect("HTTP client backend failed to initialize");
        Self { client }
    }

    /// Fetches a page body as text (used for listing pages).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, network failures,
    /// timeouts and non-success HTTP statuses.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.send_request(Method::GET, url, false).await?;
        response
            .text()
            .await
            .map_err(|e| DownloadError::from_request(url, e))
    }

    /// Issues a metadata-only request and returns the advertised byte length.
    ///
    /// `Ok(None)` means the server answered but sent no parseable
    /// `Content-Length`. Compression is refused so the length matches the
    /// bytes a later download writes to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the HEAD request itself fails.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn content_length(&self, url: &str) -> Result<Option<u64>, DownloadError> {
        let response = self.send_request(Method::HEAD, url, true).await?;
        let length = header_content_length(&response);
        debug!(?length, "resolved content length");
        Ok(length)
    }

    /// Opens a streaming GET; the caller drains the body chunk by chunk.
    ///
    /// The body is requested uncompressed, like [`Self::content_length`].
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the request fails or the status is not
    /// a success.
    pub async fn open_stream(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        self.send_request(Method::GET, url, true).await
    }

    /// Sends one request; any status outside 2xx is an error.
    ///
    /// With `identity` set the request opts out of content encoding.
    async fn send_request(
        &self,
        method: Method,
        url: &str,
        identity: bool,
    ) -> Result<reqwest::Response, DownloadError> {
        let target = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let mut request = self.client.request(method, target);
        if identity {
            request = request.header(ACCEPT_ENCODING, "identity");
        }
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_request(url, e))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            status => Err(DownloadError::http_status(url, status.as_u16())),
        }
    }
}

/// Reads `Content-Length` from the response headers.
///
/// The header is read directly because `Response::content_length` reports
/// the body size, which is zero for HEAD responses.
pub(crate) fn header_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn build_client(
    session: Option<Arc<Jar>>,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .read_timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent());
    match session {
        Some(jar) => builder.cookie_provider(jar).build(),
        None => builder.build(),
    }
}

fn user_agent() -> String {
    concat!("course-sync/", env!("CARGO_PKG_VERSION")).to_string()
}
