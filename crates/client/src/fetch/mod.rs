//! HTTP fetch layer for the resolver.
//!
//! Two reqwest clients share one configuration:
//!
//! - the *hop* client never follows redirects, so every 3xx response is
//!   observed by the redirect loop;
//! - the *page* client follows transport redirects and is used to download
//!   tracker pages that carry a script-embedded redirect.
//!
//! Both apply the configured timeout to every request. No custom headers are
//! sent unless a User-Agent is configured.

pub mod url;

use bytes::Bytes;
use reqwest::{Client, StatusCode, header, redirect};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, normalize_input};

use ::url::Url;
use untrack_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Optional User-Agent header (default: none)
    pub user_agent: Option<String>,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Redirects the page client follows on its own (default: 10)
    pub max_page_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: None, timeout: Duration::from_millis(20000), max_page_redirects: 10 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// Outcome of a single non-following GET.
#[derive(Debug, Clone)]
pub struct Hop {
    /// HTTP status code
    pub status: StatusCode,
    /// `Location` header, lossily decoded as UTF-8
    pub location: Option<String>,
}

impl Hop {
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }
}

/// Response from a page fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after transport redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response body bytes
    pub bytes: Bytes,
}

/// HTTP client pair used by the resolver.
#[derive(Debug, Clone)]
pub struct FetchClient {
    hop: Client,
    page: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let hop = Self::builder(&config)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {}", e)))?;

        let page = Self::builder(&config)
            .redirect(redirect::Policy::limited(config.max_page_redirects))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { hop, page })
    }

    fn builder(config: &FetchConfig) -> reqwest::ClientBuilder {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder
    }

    /// Issue one GET without following redirects.
    ///
    /// The body is discarded; only status and `Location` are kept.
    pub async fn hop(&self, url: &Url) -> Result<Hop, Error> {
        let response = self
            .hop
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        Ok(Hop { status, location })
    }

    /// Download a page, following transport redirects.
    ///
    /// Anything but `200 OK` is reported as an upstream status error.
    pub async fn page(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .page
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::upstream_status(format!("expected http status ok, got {}", status)));
        }

        let final_url = response.url().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("failed to read response: {}", e)))?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse { final_url, status, bytes })
    }
}

fn network_error(url: &Url, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::network(format!("GET {}: request timeout", url))
    } else {
        Error::network(format!("GET {}: {}", url, err))
    }
}
