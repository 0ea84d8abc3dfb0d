//! Entry parsing: one listing page in, typed entries out.
//!
//! [`parse_listing`] is pure and splits a page into file and directory
//! candidates. [`fetch_listing`] adds the page request, and
//! [`resolve_file_entries`] turns file candidates into [`FileEntry`] values
//! by asking the server for each file's size with a body-less request.

mod error;
pub mod filename;
mod parser;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::download::HttpClient;

pub use error::ListingError;
pub use filename::{replace_forbidden_chars, sanitize_dir_name, sanitize_file_name};
pub use parser::{Listing, RemoteEntry, parse_listing};

/// A remote file whose size has been looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Sanitized local file name.
    pub name: String,
    /// Absolute remote URL.
    pub url: String,
    /// Size in bytes; `None` when the lookup failed or the server sent no
    /// usable length.
    pub size: Option<u64>,
}

/// Fetches and parses the listing page at `listing_url`.
///
/// # Errors
///
/// Returns [`ListingError`] when the request fails or the page is not a
/// listing.
pub async fn fetch_listing(client: &HttpClient, listing_url: &Url) -> Result<Listing, ListingError> {
    let html = client
        .fetch_text(listing_url.as_str())
        .await
        .map_err(ListingError::request)?;
    parse_listing(&html, listing_url)
}

/// Looks up the size of every file candidate, preserving order.
///
/// Each lookup holds one permit of `slots` while its request is in flight.
/// A failed lookup never fails the listing: the entry is kept with an
/// unknown size, which makes the diff walker always download it.
pub async fn resolve_file_entries(
    client: &HttpClient,
    candidates: &[RemoteEntry],
    slots: &Semaphore,
) -> Vec<FileEntry> {
    join_all(candidates.iter().map(|candidate| async move {
        let size = {
            let _permit = slots.acquire().await.ok();
            match client.content_length(&candidate.url).await {
                Ok(size) => size,
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "size lookup failed; file will be re-downloaded");
                    None
                }
            }
        };
        let name = sanitize_file_name(&candidate.name, &candidate.href);
        debug!(name = %name, ?size, "resolved file entry");
        FileEntry {
            name,
            url: candidate.url.clone(),
            size,
        }
    }))
    .await
}
