//! Remote tree crawling.
//!
//! The crawler walks a course's listing pages recursively and returns the
//! whole hierarchy as a [`ResourceTree`]. A listing that cannot be read
//! below the root becomes a failure marker on that node; the rest of the
//! tree is still crawled. Only a failure of the root listing fails the
//! crawl as a whole.

pub mod tree;

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::HttpClient;
use crate::listing::{
    Listing, ListingError, fetch_listing, resolve_file_entries, sanitize_dir_name,
};

pub use tree::{CrawlFailure, ResourceTree};

/// Default number of concurrent requests one course crawl may issue.
pub const DEFAULT_REQUESTS_PER_CRAWL: usize = 4;

/// Errors that prevent a crawl from producing any tree.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The root listing URL does not parse.
    #[error("invalid listing URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The root listing could not be read.
    #[error("cannot read root listing {url}: {source}")]
    RootListing {
        /// Root listing URL.
        url: String,
        /// Underlying listing error.
        #[source]
        source: ListingError,
    },
}

/// Recursive crawler over listing pages.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: HttpClient,
    slots: Arc<Semaphore>,
}

impl Crawler {
    /// Creates a crawler issuing at most `request_concurrency` requests at
    /// a time (clamped to at least one).
    #[must_use]
    pub fn new(client: HttpClient, request_concurrency: usize) -> Self {
        Self {
            client,
            slots: Arc::new(Semaphore::new(request_concurrency.max(1))),
        }
    }

    /// Crawls the hierarchy rooted at `listing_url`, labelling the root node
    /// `label`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError`] when the URL is invalid or the root listing
    /// cannot be fetched. Failures further down are recorded in the tree.
    #[instrument(skip(self), fields(url = %listing_url))]
    pub async fn crawl(&self, listing_url: &str, label: &str) -> Result<ResourceTree, CrawlError> {
        let url = Url::parse(listing_url).map_err(|_| CrawlError::InvalidUrl {
            url: listing_url.to_string(),
        })?;

        let listing = self
            .fetch(&url)
            .await
            .map_err(|source| CrawlError::RootListing {
                url: listing_url.to_string(),
                source,
            })?;

        let tree = self.build_node(url, label.to_string(), listing).await;
        info!(
            files = tree.file_count(),
            directories = tree.directory_count(),
            failed_branches = tree.failures().len(),
            "crawl complete"
        );
        Ok(tree)
    }

    async fn fetch(&self, url: &Url) -> Result<Listing, ListingError> {
        let _permit = self.slots.acquire().await.ok();
        fetch_listing(&self.client, url).await
    }

    fn crawl_subtree(&self, url: Url, label: String) -> BoxFuture<'_, ResourceTree> {
        async move {
            match self.fetch(&url).await {
                Ok(listing) => self.build_node(url, label, listing).await,
                Err(e) => {
                    warn!(url = %url, error = %e, "listing failed; skipping sub-tree");
                    ResourceTree::failed(label, url.as_str(), e.to_string())
                }
            }
        }
        .boxed()
    }

    async fn build_node(&self, url: Url, label: String, listing: Listing) -> ResourceTree {
        let subtrees = listing.directories.iter().filter_map(|dir| {
            let child_url = match Url::parse(&dir.url) {
                Ok(child_url) if is_strictly_below(&child_url, &url) => child_url,
                _ => {
                    warn!(parent = %url, href = %dir.href, "directory link leaves the listing; not following");
                    return None;
                }
            };
            let child_label = sanitize_dir_name(&dir.name, &dir.href);
            Some(self.crawl_subtree(child_url, child_label))
        });

        let (files, children) = tokio::join!(
            resolve_file_entries(&self.client, &listing.files, &self.slots),
            join_all(subtrees),
        );

        debug!(url = %url, files = files.len(), children = children.len(), "built node");
        ResourceTree {
            label,
            url: url.into(),
            files,
            children,
            error: None,
        }
    }
}

/// True when `child` is a proper descendant path of `parent` on the same
/// origin. Guards the recursion against links back up the hierarchy.
fn is_strictly_below(child: &Url, parent: &Url) -> bool {
    child.origin() == parent.origin()
        && child.path().len() > parent.path().len()
        && child.path().starts_with(parent.path())
}
