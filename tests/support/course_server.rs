//! Mock course server fixtures: listing pages and file endpoints.
//!
//! File mocks match any method, so the size lookup (HEAD) and the transfer
//! (GET) are both served from the same body.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renders a listing page with one table row per `(href, text)` pair, plus
/// the navigation links real pages carry.
#[allow(dead_code)]
pub fn listing_page(rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(href, text)| {
            format!("<tr><td class=\"title\"><a href=\"{href}\">{text}</a></td></tr>\n")
        })
        .collect();
    format!(
        "<html><head><title>Resources</title></head><body>\n\
         <a href=\"/portal\">Back to site</a>\n\
         <table class=\"listHier\">\n\
         <tr><th><a href=\"?sort=name\">Name</a></th></tr>\n\
         <tr><td><a href=\"../\">Up one level</a></td></tr>\n\
         {rows}</table>\n</body></html>"
    )
}

/// Serves a listing page at `listing_path`.
#[allow(dead_code)]
pub async fn mount_listing(server: &MockServer, listing_path: &str, rows: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(listing_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(rows)))
        .mount(server)
        .await;
}

/// Serves `body` at `file_path` for every method.
#[allow(dead_code)]
pub async fn mount_file(server: &MockServer, file_path: &str, body: &[u8]) {
    Mock::given(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Answers every request to `any_path` with `status`.
#[allow(dead_code)]
pub async fn mount_status(server: &MockServer, any_path: &str, status: u16) {
    Mock::given(path(any_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Listing URL of `listing_path` on `server`.
#[allow(dead_code)]
pub fn listing_url(server: &MockServer, listing_path: &str) -> String {
    format!("{}{listing_path}", server.uri())
}
