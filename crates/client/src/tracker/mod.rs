//! Tracker registry and extraction strategies.
//!
//! A tracker is an intermediary host whose URLs hide the real destination.
//! Each registered host maps to a [`Strategy`] that turns a tracker URL into
//! the next URL of the chain.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::extract::fetch_script_redirect;
use crate::fetch::FetchClient;
use untrack_core::Error;

/// Custom extraction logic for hosts the built-in strategies do not cover.
#[async_trait]
pub trait Extract: Send + Sync {
    /// Map a tracker URL to the URL it points at.
    async fn extract(&self, url: &Url) -> Result<Url, Error>;
}

/// How to get the destination out of a tracker URL.
#[derive(Clone)]
pub enum Strategy {
    /// The destination is the value of a query parameter.
    QueryParam(String),
    /// The tracker serves a page with a script-embedded redirect.
    ScriptRedirect,
    /// Anything else.
    Custom(Arc<dyn Extract>),
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::QueryParam(name) => f.debug_tuple("QueryParam").field(name).finish(),
            Strategy::ScriptRedirect => f.write_str("ScriptRedirect"),
            Strategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Strategy {
    pub fn query_param(name: impl Into<String>) -> Self {
        Strategy::QueryParam(name.into())
    }

    pub fn custom(extractor: impl Extract + 'static) -> Self {
        Strategy::Custom(Arc::new(extractor))
    }

    /// Run the strategy against a tracker URL.
    ///
    /// Only [`Strategy::ScriptRedirect`] touches the network, through `fetch`.
    pub async fn run(&self, url: &Url, fetch: &FetchClient) -> Result<Url, Error> {
        match self {
            Strategy::QueryParam(name) => extract_query_param(url, name),
            Strategy::ScriptRedirect => fetch_script_redirect(fetch, url).await,
            Strategy::Custom(extractor) => extractor.extract(url).await,
        }
    }
}

/// Read an absolute URL from the first `name` query parameter.
pub fn extract_query_param(url: &Url, name: &str) -> Result<Url, Error> {
    let value = url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    Url::parse(&value).map_err(|_| Error::extract_failed(format!("malformed url at {}={:?}", name, value)))
}

/// Host to strategy mapping.
#[derive(Debug, Clone, Default)]
pub struct TrackerRegistry {
    strategies: BTreeMap<String, Strategy>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tracker table.
    pub fn builtin() -> Self {
        let mut trackers = Self::new();

        // http://ali.pub/ahgiu
        trackers.register("s.click.aliexpress.com", Strategy::query_param("dl_target_url"));
        // http://fas.st/mKKaRE
        trackers.register("ad.admitad.com", Strategy::query_param("ulp"));
        trackers.register("lenkmio.com", Strategy::query_param("ulp"));
        // http://ali.ski/gkMqy
        trackers.register("alitems.com", Strategy::query_param("ulp"));
        // video description links: /redirect?event=video_description&q=<target>
        trackers.register("www.youtube.com", Strategy::query_param("q"));

        // http://ali.pub/2c753s
        trackers.register("epnclick.ru", Strategy::ScriptRedirect);
        // http://ali.pub/2c76pq
        trackers.register("shopeasy.by", Strategy::ScriptRedirect);

        trackers
    }

    /// Insert or replace the strategy for `host`, returning the previous one.
    pub fn register(&mut self, host: impl Into<String>, strategy: Strategy) -> Option<Strategy> {
        self.strategies.insert(host.into(), strategy)
    }

    pub fn get(&self, host: &str) -> Option<&Strategy> {
        self.strategies.get(host)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.strategies.contains_key(host)
    }

    /// Registered hosts in lexicographic order.
    pub fn hosts(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Strategy)> {
        self.strategies.iter().map(|(host, strategy)| (host.as_str(), strategy))
    }
}
