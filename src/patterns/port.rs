//! Port-announcement detection for dev servers.
//!
//! Matches phrases like "listening on 3000", loopback `host:port` pairs and
//! domain-like hosts followed by a port.

use regex::Regex;
use std::sync::LazyLock;

static PORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)(?:(?:listening|running|serving|started|available)(?:\s+(?:on|at))|\s*(?:http://)?(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1?\])|\s*(?:https?://)?(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,})(?::|\s+port\s+)?(\d+)/?",
    )
    .unwrap()
});

/// Returns the announced port, if the text announces one.
///
/// Expects ANSI-stripped text.
pub fn detect_port(text: &str) -> Option<u16> {
    PORT_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| m.as_str().parse().ok())
}
