//! Input normalization for dirty links.
//!
//! Users paste links without a scheme (`s.click.aliexpress.com?...`) or in
//! protocol-relative form (`//host/path`). Such input gets a scheme guessed from
//! the port: `http` for an explicit `:80`, `https` otherwise.

/// Error type for URL normalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },
}

/// Normalize a user-supplied URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Treat input without `scheme://` as schemeless (`//` prefix optional)
/// 3. Assign `http` to schemeless input whose authority ends in `:80`, `https` otherwise
/// 4. Accept only `http` and `https`
pub fn normalize_input(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        let rest = trimmed.strip_prefix("//").unwrap_or(trimmed);
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let scheme = if authority.ends_with(":80") { "http" } else { "https" };
        format!("{scheme}://{rest}")
    };

    let parsed = url::Url::parse(&url_str)
        .map_err(|e| UrlError::InvalidUrl { input: trimmed.to_string(), reason: e.to_string() })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}

/// `scheme://` before any query or fragment; an encoded URL inside a query value does not count.
fn has_scheme(input: &str) -> bool {
    input
        .split(['?', '#'])
        .next()
        .is_some_and(|head| head.contains("://"))
}
