//! Directory listing page parsing.
//!
//! A listing page is an HTML document with one table whose anchors are the
//! entries of a remote directory. Whether an entry is a sub-directory is
//! decided purely by its `href` ending in `/`; the server sends no other
//! type information.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::error::ListingError;

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<table\b[^>]*>(.*?)</table\s*>"));
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<a\b([^>]*)>(.*?)</a\s*>"));
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// One anchor found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    /// Anchor text with tags stripped and entities decoded.
    pub name: String,
    /// The `href` as written on the page (entities decoded).
    pub href: String,
    /// `href` resolved against the listing URL.
    pub url: String,
}

impl RemoteEntry {
    /// True when the entry names a sub-directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.href.ends_with('/')
    }
}

/// The classified entries of one listing page, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// File candidates.
    pub files: Vec<RemoteEntry>,
    /// Sub-directory candidates.
    pub directories: Vec<RemoteEntry>,
}

impl Listing {
    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len()
    }

    /// True when the page listed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

/// Parses a listing page into file and directory candidates.
///
/// Anchors pointing at the parent directory (`..`), at the listing itself
/// (`.`, `./`), at a fragment, or at a sort/query link are dropped; keeping
/// them would make the crawl revisit pages it has already seen.
///
/// # Errors
///
/// Returns [`ListingError::MissingTable`] when the page has no table, which
/// usually means the server answered with a login or error page instead of
/// a listing.
pub fn parse_listing(html: &str, listing_url: &Url) -> Result<Listing, ListingError> {
    let table = TABLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ListingError::missing_table(listing_url.as_str()))?
        .as_str();

    let mut listing = Listing::default();
    for anchor in ANCHOR_RE.captures_iter(table) {
        let attrs = anchor.get(1).map_or("", |m| m.as_str());
        let Some(href) = extract_href(attrs) else {
            continue;
        };
        if is_navigation_href(&href) {
            debug!(href = %href, "skipping navigation link");
            continue;
        }

        let Ok(url) = listing_url.join(&href) else {
            debug!(href = %href, "skipping unresolvable link");
            continue;
        };

        let text = anchor.get(2).map_or("", |m| m.as_str());
        let entry = RemoteEntry {
            name: anchor_text(text),
            href,
            url: url.into(),
        };
        if entry.is_directory() {
            listing.directories.push(entry);
        } else {
            listing.files.push(entry);
        }
    }

    debug!(
        url = %listing_url,
        files = listing.files.len(),
        directories = listing.directories.len(),
        "parsed listing"
    );
    Ok(listing)
}

fn extract_href(attrs: &str) -> Option<String> {
    let caps = HREF_RE.captures(attrs)?;
    let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
    let href = decode_entities(raw.as_str().trim());
    (!href.is_empty()).then_some(href)
}

/// Links that never denote a child entry.
fn is_navigation_href(href: &str) -> bool {
    href.starts_with("..")
        || href == "."
        || href == "./"
        || href.starts_with('#')
        || href.starts_with('?')
        || href.starts_with("mailto:")
        || href.starts_with("javascript:")
}

fn anchor_text(inner_html: &str) -> String {
    let without_tags = TAG_RE.replace_all(inner_html, "");
    let decoded = decode_entities(&without_tags);
    WHITESPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

/// Decodes the HTML entities that show up in listing markup.
fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://course.example.edu/access/content/group/1234/").unwrap()
    }

    fn page(rows: &str) -> String {
        format!(
            "<html><body><h2>Course</h2><a href=\"/portal\">Home</a><table class=\"listHier\">{rows}</table></body></html>"
        )
    }

    #[test]
    fn test_parse_listing_classifies_by_trailing_slash() {
        let html = page(
            r#"<tr><td><a href="../">Up</a></td></tr>
               <tr><td><a href="Week%201/">Week 1</a></td></tr>
               <tr><td><a href="syllabus.pdf">Syllabus</a></td></tr>"#,
        );
        let listing = parse_listing(&html, &base()).unwrap();

        assert_eq!(listing.directories.len(), 1);
        assert_eq!(listing.directories[0].name, "Week 1");
        assert_eq!(
            listing.directories[0].url,
            "https://course.example.edu/access/content/group/1234/Week%201/"
        );
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].name, "Syllabus");
        assert_eq!(listing.files[0].href, "syllabus.pdf");
    }

    #[test]
    fn test_parse_listing_ignores_anchors_outside_table() {
        let listing = parse_listing(&page(""), &base()).unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn test_parse_listing_drops_parent_and_self_links() {
        let html = page(
            r##"<a href="..">Parent</a><a href="../../">Grandparent</a>
               <a href=".">Self</a><a href="./">Self</a>
               <a href="#top">Top</a><a href="?sort=name">Name</a>"##,
        );
        let listing = parse_listing(&html, &base()).unwrap();
        assert!(listing.is_empty(), "unexpected entries: {listing:?}");
    }

    #[test]
    fn test_parse_listing_preserves_page_order() {
        let html = page(
            r#"<a href="c/">C</a><a href="a/">A</a><a href="b/">B</a><a href="z.txt">z</a><a href="y.txt">y</a>"#,
        );
        let listing = parse_listing(&html, &base()).unwrap();
        let dirs: Vec<_> = listing.directories.iter().map(|d| d.name.as_str()).collect();
        let files: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(dirs, ["C", "A", "B"]);
        assert_eq!(files, ["z", "y"]);
    }

    #[test]
    fn test_parse_listing_decodes_text_and_href() {
        let html = page(
            r#"<a class='file' href='Q&amp;A.pdf'><span class="icon"></span> Q&amp;A   &#8211; part&nbsp;1 </a>"#,
        );
        let listing = parse_listing(&html, &base()).unwrap();
        assert_eq!(listing.files[0].href, "Q&A.pdf");
        assert_eq!(listing.files[0].name, "Q&A – part 1");
    }

    #[test]
    fn test_parse_listing_skips_anchor_without_href() {
        let html = page(r#"<a name="anchor">x</a><a href="">empty</a><a href=notes.txt>Notes</a>"#);
        let listing = parse_listing(&html, &base()).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.files[0].href, "notes.txt");
    }

    #[test]
    fn test_parse_listing_without_table_is_error() {
        let result = parse_listing("<html><form>login</form></html>", &base());
        assert!(matches!(result, Err(ListingError::MissingTable { .. })));
    }

    #[test]
    fn test_decode_entities_leaves_unknown_entities() {
        assert_eq!(decode_entities("a &bogus; b &#x41;"), "a &bogus; b A");
    }
}
