//! Host keys and output rendering for URLs.

use url::{Position, Url};

/// Registry key for a URL: `host` or `host:port` when the port is not the
/// scheme default.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Render a URL for output.
///
/// A bare root path is dropped so `https://letyshops.ru/` reads as
/// `https://letyshops.ru`; everything else is `Url::as_str` verbatim.
pub fn display_url(url: &Url) -> String {
    if url.cannot_be_a_base() || url.path() != "/" {
        return url.as_str().to_string();
    }
    format!("{}{}", &url[..Position::AfterPort], &url[Position::AfterPath..])
}
