//! Guard for unit tests that need a localhost socket for `wiremock`.
//!
//! Some sandboxes forbid binding even the loopback interface. Tests then
//! skip with a note on stderr, unless `COURSE_SYNC_REQUIRE_SOCKET_TESTS` is
//! set, in which case they fail.

use std::net::TcpListener;
use std::sync::OnceLock;

use wiremock::MockServer;

const STRICT_ENV: &str = "COURSE_SYNC_REQUIRE_SOCKET_TESTS";

fn loopback_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| TcpListener::bind(("127.0.0.1", 0)).is_ok())
}

fn strict_mode() -> bool {
    std::env::var(STRICT_ENV).is_ok_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )
    })
}

/// Starts a mock course server, or returns `None` when no socket can be
/// bound here.
///
/// # Panics
///
/// Panics instead of skipping when strict mode is enabled.
pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
    if loopback_available() {
        return Some(MockServer::start().await);
    }

    let current = std::thread::current();
    let test = current.name().unwrap_or("<unnamed test>");
    assert!(
        !strict_mode(),
        "{test}: cannot bind 127.0.0.1 and {STRICT_ENV} is set"
    );
    eprintln!("{test}: skipped, cannot bind 127.0.0.1 (set {STRICT_ENV}=1 to fail instead)");
    None
}
