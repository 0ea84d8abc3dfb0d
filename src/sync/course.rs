//! Course identity: a display name plus the root listing URL.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use super::SyncError;
use crate::listing::sanitize_dir_name;

/// Path prefix of resource listing pages.
const LISTING_PATH_PREFIX: &str = "/access/content/group/";

/// Path segment preceding the course id in course site URLs.
const SITE_SEGMENT: &str = "site";

/// One course to synchronize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Course {
    /// Display name; also the course's directory under the sync root.
    pub name: String,
    /// Root resource listing URL (always ends with `/`).
    pub listing_url: String,
}

impl Course {
    /// Creates a course from a name and any supported URL.
    ///
    /// Accepted URL shapes:
    /// - a resource listing URL (`.../access/content/group/<id>/`), used as
    ///   is with a trailing slash enforced;
    /// - a course site URL (`.../portal/site/<id>`), converted to
    ///   `<scheme>://<host>/access/content/group/<id>/`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCourse`] when the name is blank or the URL
    /// cannot be parsed or has neither shape.
    pub fn new(name: &str, url: &str) -> Result<Self, SyncError> {
        Self::build(name, url, true)
    }

    /// Creates a course from a course site URL only (`.../portal/site/<id>`).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCourse`] when the name is blank or the URL
    /// is not a site URL, including when it is already a listing URL.
    pub fn from_site_url(name: &str, site_url: &str) -> Result<Self, SyncError> {
        Self::build(name, site_url, false)
    }

    fn build(name: &str, url: &str, accept_listing_url: bool) -> Result<Self, SyncError> {
        let invalid = |reason: &str| SyncError::InvalidCourse {
            input: format!("{name}={url}"),
            reason: reason.to_string(),
        };

        let label = sanitize_dir_name(name, "");
        if label.is_empty() {
            return Err(invalid("course name is empty"));
        }

        let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("URL scheme must be http or https"));
        }

        let listing_url = if accept_listing_url && parsed.path().starts_with(LISTING_PATH_PREFIX) {
            listing_url_with_slash(&parsed)
        } else if let Some(id) = site_id(&parsed) {
            let mut listing = parsed.clone();
            listing.set_path(&format!("{LISTING_PATH_PREFIX}{id}/"));
            listing.set_query(None);
            listing.set_fragment(None);
            listing.into()
        } else if accept_listing_url {
            return Err(invalid(
                "expected a resource listing URL (/access/content/group/<id>/) or a site URL (/portal/site/<id>)",
            ));
        } else {
            return Err(invalid("expected a site URL (/portal/site/<id>)"));
        };

        Ok(Self {
            name: label,
            listing_url,
        })
    }
}

impl FromStr for Course {
    type Err = SyncError;

    /// Parses `NAME=URL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, url)) = s.split_once('=') else {
            return Err(SyncError::InvalidCourse {
                input: s.to_string(),
                reason: "expected NAME=URL".to_string(),
            });
        };
        Self::new(name, url)
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.listing_url)
    }
}

fn listing_url_with_slash(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.into()
}

/// Course id following a `site` path segment.
fn site_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    segments.find(|s| *s == SITE_SEGMENT)?;
    segments.next().map(ToString::to_string)
}
