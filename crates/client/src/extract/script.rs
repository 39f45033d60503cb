//! Script-embedded redirect extraction.
//!
//! Some trackers answer with a small HTML page whose only job is
//! `window.location = '...'`. The destination is recovered with a regular
//! expression over each inline script line; no script is executed.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::fetch::FetchClient;
use untrack_core::Error;

// https://regex101.com/r/kv1rVs/1
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:window|document)\.location\s*=\s*['"](.*?)['"]"#).expect("invalid location regex")
});

/// Query parameter some redirect pages use to wrap the real destination.
const WRAPPED_TARGET_PARAM: &str = "to";

/// Download `url` and extract its script-embedded redirect.
pub async fn fetch_script_redirect(fetch: &FetchClient, url: &Url) -> Result<Url, Error> {
    let response = fetch.page(url).await?;
    let html = String::from_utf8_lossy(&response.bytes);
    find_script_redirect(&html, &response.final_url)
}

/// Find the redirect target in an HTML document.
///
/// Relative targets are resolved against `base`. A `to` query parameter on
/// the target, when present, is the real destination.
pub fn find_script_redirect(html: &str, base: &Url) -> Result<Url, Error> {
    for script in collect_scripts(html) {
        if let Some(candidate) = find_location(&script) {
            return resolve_candidate(candidate, base);
        }
    }
    Err(Error::extract_failed("redirect location not found"))
}

/// Bodies of all non-empty `<script>` elements, in document order.
pub fn collect_scripts(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").expect("invalid selector");

    document
        .select(&selector)
        .filter(|element| element.has_children())
        .map(|element| element.text().collect::<String>())
        .collect()
}

/// First location assignment in a script, skipping blank and `//` comment lines.
fn find_location(script: &str) -> Option<&str> {
    script
        .lines()
        .map(|line| line.trim_matches([' ', '\t']))
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .find_map(|line| LOCATION_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str()))
}

fn resolve_candidate(candidate: &str, base: &Url) -> Result<Url, Error> {
    if candidate.is_empty() {
        return Err(Error::extract_failed("malformed url \"\""));
    }

    let target = base
        .join(candidate)
        .map_err(|e| Error::extract_failed(format!("malformed url {:?}: {}", candidate, e)))?;

    let wrapped = target
        .query_pairs()
        .find(|(name, _)| name == WRAPPED_TARGET_PARAM)
        .map(|(_, value)| value.into_owned());

    match wrapped {
        Some(to) if !to.is_empty() => Url::parse(&to)
            .map_err(|e| Error::extract_failed(format!("malformed url at {}={:?}: {}", WRAPPED_TARGET_PARAM, to, e))),
        _ => Ok(target),
    }
}
