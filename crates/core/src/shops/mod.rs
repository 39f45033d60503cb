//! Shop cleanup registry.
//!
//! A shop is a final destination host. Its URLs are rewritten by a
//! [`CleanupRule`] once the redirect chain has been resolved.

pub mod rule;

pub use rule::{CleanupRule, QueryRule};

use std::collections::BTreeMap;
use url::Url;

use crate::location::host_key;

/// Host to cleanup rule mapping.
#[derive(Debug, Clone, Default)]
pub struct ShopRegistry {
    rules: BTreeMap<String, CleanupRule>,
}

impl ShopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in shop table.
    pub fn builtin() -> Self {
        let mut shops = Self::new();

        shops.register("tmall.aliexpress.com", CleanupRule::allow(["SearchText"]));
        shops.register("ru.aliexpress.com", CleanupRule::allow(["SearchText"]));
        shops.register("www.gearbest.com", CleanupRule::drop_query());
        shops.register("www.coolicool.com", CleanupRule::drop_query());
        shops.register("www.tinydeal.com", CleanupRule::drop_query());
        shops.register("www.banggood.com", CleanupRule::drop_query());
        shops.register("multivarka.pro", CleanupRule::allow(["q"]));

        // cashback services rather than shops
        shops.register("epn.bz", CleanupRule::drop_query());
        shops.register("ali.epn.bz", CleanupRule::drop_query());
        shops.register("cashback.epn.bz", CleanupRule::drop_query().with_drop_path());
        shops.register("alibonus.com", CleanupRule::drop_query().with_drop_path());
        shops.register("letyshops.ru", CleanupRule::drop_query().with_drop_path().with_scheme("https"));
        shops.register("letyshops.com", CleanupRule::drop_query());

        shops
    }

    /// Insert or replace the rule for `host`, returning the previous one.
    pub fn register(&mut self, host: impl Into<String>, rule: CleanupRule) -> Option<CleanupRule> {
        self.rules.insert(host.into(), rule)
    }

    pub fn get(&self, host: &str) -> Option<&CleanupRule> {
        self.rules.get(host)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.rules.contains_key(host)
    }

    /// Registered hosts in lexicographic order.
    pub fn hosts(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the rule registered for the URL's host, if any.
    ///
    /// URLs of unknown hosts are returned unchanged.
    pub fn cleanup(&self, url: &Url) -> Url {
        let host = host_key(url);
        match self.rules.get(&host) {
            Some(rule) => {
                tracing::debug!("applying rule {:?} to {}", rule, url);
                rule.apply(url)
            }
            None => url.clone(),
        }
    }
}
