//! File and directory name sanitization for listing entries.
//!
//! Local names must be reproducible across runs byte for byte, otherwise the
//! size comparison in the diff walker would look at the wrong path and
//! re-download everything.

/// Characters that are not allowed in local file names, paired with the
/// visually similar replacement used instead.
const REPLACEMENTS: [(char, char); 9] = [
    (':', '：'),
    ('?', '？'),
    ('*', '_'),
    ('"', '\''),
    ('<', '('),
    ('>', ')'),
    ('|', '_'),
    ('/', '_'),
    ('\\', '_'),
];

/// Replaces forbidden filesystem characters with their substitutes.
#[must_use]
pub fn replace_forbidden_chars(name: &str) -> String {
    name.chars()
        .map(|ch| {
            REPLACEMENTS
                .iter()
                .find(|(forbidden, _)| *forbidden == ch)
                .map_or(ch, |(_, replacement)| *replacement)
        })
        .collect()
}

/// Builds the local file name for a listing entry.
///
/// `display_name` is the anchor text; `href` is the entry's (relative or
/// absolute) URL. When the anchor text is blank the last URL segment is used
/// instead. When the URL carries an extension that the name does not end
/// with, the URL's extension is appended.
#[must_use]
pub fn sanitize_file_name(display_name: &str, href: &str) -> String {
    let trimmed = display_name.trim();
    let name = if trimmed.is_empty() {
        last_url_segment(href)
    } else {
        trimmed.to_string()
    };

    let mut sanitized = replace_forbidden_chars(&name);
    let url_ext = extension(url_path(href));
    if !url_ext.is_empty() && url_ext != extension(&name) {
        sanitized.push_str(url_ext);
    }
    sanitized
}

/// Builds the local directory name for a sub-directory entry.
#[must_use]
pub fn sanitize_dir_name(display_name: &str, href: &str) -> String {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        replace_forbidden_chars(&last_url_segment(href))
    } else {
        replace_forbidden_chars(trimmed)
    }
}

/// Extension of the final path component, including the leading dot.
///
/// Leading dots of the component do not start an extension (`.bashrc` has
/// none), and a trailing dot alone counts as the extension `.`.
fn extension(path: &str) -> &str {
    let component = path.rsplit('/').next().unwrap_or(path);
    let stem_start = component.len() - component.trim_start_matches('.').len();
    match component[stem_start..].rfind('.') {
        Some(dot) => &component[stem_start + dot..],
        None => "",
    }
}

/// Path part of an href, without query string or fragment.
fn url_path(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}

/// Percent-decoded last non-empty segment of an href.
fn last_url_segment(href: &str) -> String {
    let segment = url_path(href)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}
