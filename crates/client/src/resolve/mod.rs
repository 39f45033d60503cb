//! Redirect resolution and cleanup.
//!
//! [`Resolver::untrack`] drives the whole pipeline:
//!
//! 1. normalize the input ([`normalize_input`])
//! 2. follow the chain ([`Resolver::follow`]), resolving trackers without
//!    network access where possible and issuing one non-following GET per hop
//! 3. apply the shop's cleanup rule and render the result
//!
//! Both the HTTP redirect loop and the tracker loop stop after
//! [`MAX_REDIRECTS`] steps.

use url::Url;

use crate::fetch::{FetchClient, FetchConfig, normalize_input};
use crate::tracker::{Strategy, TrackerRegistry};
use untrack_core::{AppConfig, CleanupRule, Error, ShopRegistry, UnknownHostPolicy, display_url, host_key};

/// Maximum number of HTTP redirects (and, separately, tracker extractions) per resolution.
pub const MAX_REDIRECTS: usize = 10;

/// Builder for [`Resolver`].
///
/// Starts from the built-in tracker and shop tables.
#[derive(Debug)]
pub struct ResolverBuilder {
    fetch: FetchConfig,
    trackers: TrackerRegistry,
    shops: ShopRegistry,
    policy: UnknownHostPolicy,
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            trackers: TrackerRegistry::builtin(),
            shops: ShopRegistry::builtin(),
            policy: UnknownHostPolicy::default(),
        }
    }
}

impl ResolverBuilder {
    /// Take timeout, User-Agent and unknown host policy from the app config.
    pub fn config(mut self, config: &AppConfig) -> Self {
        self.fetch = FetchConfig::from(config);
        self.policy = config.unknown_host_policy();
        self
    }

    pub fn trackers(mut self, trackers: TrackerRegistry) -> Self {
        self.trackers = trackers;
        self
    }

    pub fn shops(mut self, shops: ShopRegistry) -> Self {
        self.shops = shops;
        self
    }

    /// Register one tracker on top of the current table.
    pub fn tracker(mut self, host: impl Into<String>, strategy: Strategy) -> Self {
        self.trackers.register(host, strategy);
        self
    }

    /// Register one shop on top of the current table.
    pub fn shop(mut self, host: impl Into<String>, rule: CleanupRule) -> Self {
        self.shops.register(host, rule);
        self
    }

    pub fn policy(mut self, policy: UnknownHostPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<Resolver, Error> {
        Ok(Resolver {
            fetch: FetchClient::new(self.fetch)?,
            trackers: self.trackers,
            shops: self.shops,
            policy: self.policy,
        })
    }
}

/// Resolves tracking links to clean destination URLs.
///
/// Registries are fixed once built, so a shared `&Resolver` can serve
/// concurrent resolutions.
#[derive(Debug, Clone)]
pub struct Resolver {
    fetch: FetchClient,
    trackers: TrackerRegistry,
    shops: ShopRegistry,
    policy: UnknownHostPolicy,
}

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Resolver with the built-in tables, configured from `config`.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        Self::builder().config(config).build()
    }

    pub fn trackers(&self) -> &TrackerRegistry {
        &self.trackers
    }

    pub fn shops(&self) -> &ShopRegistry {
        &self.shops
    }

    pub fn policy(&self) -> UnknownHostPolicy {
        self.policy
    }

    /// Resolve `raw` and return the cleaned destination URL.
    ///
    /// # Errors
    ///
    /// Domain errors for bad input, network failures, tracker failures and
    /// redirect loops. With [`UnknownHostPolicy::Reject`], a destination
    /// without a cleanup rule is an `UnknownShop` error.
    pub async fn untrack(&self, raw: &str) -> Result<String, Error> {
        let url = normalize_input(raw).map_err(|e| Error::invalid_url(e.to_string()))?;
        let target = self.follow(url).await?;

        let host = host_key(&target);
        if !self.shops.contains(&host) {
            return match self.policy {
                UnknownHostPolicy::Passthrough => {
                    tracing::warn!("host {:?} not found in known shops, returning it as-is", host);
                    Ok(target.into())
                }
                UnknownHostPolicy::Reject => Err(Error::unknown_shop(&host)),
            };
        }

        Ok(display_url(&self.shops.cleanup(&target)))
    }

    /// Follow the redirect chain starting at `url`.
    ///
    /// Stops at the first shop host, at the first non-redirect response, or at
    /// a redirect without `Location`. Shop hosts are never fetched.
    pub async fn follow(&self, url: Url) -> Result<Url, Error> {
        let mut current = url;
        let mut redirects_followed = 0;

        loop {
            let target = self.dispatch(current).await?;
            if self.shops.contains(&host_key(&target)) {
                return Ok(target);
            }
            current = target;

            let hop = self.fetch.hop(&current).await?;
            if !hop.is_redirect() {
                return Ok(current);
            }

            let Some(location) = hop.location else {
                tracing::debug!("{} answered {} without Location, stopping", current, hop.status);
                return Ok(current);
            };

            let next = current
                .join(&location)
                .map_err(|e| Error::invalid_url(format!("bad Location {:?} from {}: {}", location, current, e)))?;

            tracing::debug!(get = %current, loc = %next, "following redirect");

            redirects_followed += 1;
            if redirects_followed > MAX_REDIRECTS {
                return Err(Error::max_redirects(MAX_REDIRECTS));
            }
            current = next;
        }
    }

    /// Resolve tracker URLs until the host is no longer a tracker.
    ///
    /// URLs of non-tracker hosts come back unchanged. Failures carry the
    /// tracker host that produced them.
    pub async fn dispatch(&self, url: Url) -> Result<Url, Error> {
        let mut current = url;
        let mut extractions = 0;

        loop {
            let host = host_key(&current);
            let Some(strategy) = self.trackers.get(&host) else {
                return Ok(current);
            };

            tracing::debug!("intercepted tracker: {:?}", host);

            extractions += 1;
            if extractions > MAX_REDIRECTS {
                return Err(Error::max_redirects(MAX_REDIRECTS).with_tracker(&host));
            }

            current = strategy
                .run(&current, &self.fetch)
                .await
                .map_err(|e| e.with_tracker(&host))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Extract;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use untrack_core::ErrorKind;

    const SCRIPT_PAGE: &str = r#"<!DOCTYPE html>
        <html>
            <head>
                <title>Redirecting...</title>
                <meta charset="utf-8">
            </head>
            <body>
                <script>SCRIPT</script>
            </body>
        </html>"#;

    fn resolver() -> Resolver {
        Resolver::builder().build().unwrap()
    }

    /// Strategy cloned from the built-in table, for re-registering under a test server host.
    fn builtin_strategy(host: &str) -> Strategy {
        TrackerRegistry::builtin().get(host).cloned().unwrap()
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Extract for Fixed {
        async fn extract(&self, _url: &Url) -> Result<Url, Error> {
            Url::parse(self.0).map_err(|e| Error::invalid_url(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_untrack_query_param_tracker_without_scheme() {
        let clean = resolver()
            .untrack("s.click.aliexpress.com?dl_target_url=https%3A%2F%2Fru.aliexpress.com%2Fstore%3Fa%3DA%26SearchText%3Dphone%26b%3DB")
            .await
            .unwrap();
        assert_eq!(clean, "https://ru.aliexpress.com/store?SearchText=phone");
    }

    #[tokio::test]
    async fn test_untrack_nested_trackers() {
        let admitad = "https://ad.admitad.com?ulp=https%3A%2F%2Fru.aliexpress.com%2Fstore%3Fa%3DA%26SearchText%3Dphone%26b%3DB%26c%3DC";
        let youtube = Url::parse_with_params("https://www.youtube.com/redirect?event=video_description", &[("q", admitad)])
            .unwrap();

        let clean = resolver().untrack(youtube.as_str()).await.unwrap();
        assert_eq!(clean, "https://ru.aliexpress.com/store?SearchText=phone");
    }

    #[tokio::test]
    async fn test_dispatch_query_param_trackers_return_target() {
        let resolver = resolver();
        let target = "https://example.org/item?id=7&x=y";

        for (host, strategy) in resolver.trackers().iter() {
            let Strategy::QueryParam(name) = strategy else { continue };
            let url = Url::parse_with_params(&format!("https://{host}/click"), &[(name.as_str(), target)]).unwrap();

            let resolved = resolver.dispatch(url).await.unwrap();
            assert_eq!(resolved.as_str(), target, "tracker {host}");
        }
    }

    #[tokio::test]
    async fn test_dispatch_non_tracker_is_identity() {
        let url = Url::parse("https://example.org/a?b=c").unwrap();
        let resolved = resolver().dispatch(url.clone()).await.unwrap();
        assert_eq!(resolved, url);
    }

    #[tokio::test]
    async fn test_dispatch_tags_failures_with_host() {
        let url = Url::parse("https://ad.admitad.com/g?subid=1").unwrap();
        let err = resolver().dispatch(url).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ExtractFailed));
        assert!(err.to_string().contains("ad.admitad.com: malformed url at ulp="));
    }

    #[tokio::test]
    async fn test_dispatch_tracker_cycle_is_bounded() {
        let resolver = Resolver::builder()
            .tracker("ping.example", Strategy::custom(Fixed("https://pong.example/")))
            .tracker("pong.example", Strategy::custom(Fixed("https://ping.example/")))
            .build()
            .unwrap();

        let err = resolver.dispatch(Url::parse("https://ping.example/").unwrap()).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MaxRedirects));
    }

    #[tokio::test]
    async fn test_untrack_redirect_chain_to_shop() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/redirect");
                then.status(302).header("Location", "/ref");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ref");
                then.status(302).header("Location", "https://ru.aliexpress.com?wid=21&admitad_uid=XYZ");
            })
            .await;

        let resolver = Resolver::builder().shop("ru.aliexpress.com", CleanupRule::drop_query()).build().unwrap();
        let clean = resolver.untrack(&server.url("/redirect")).await.unwrap();

        assert_eq!(clean, "https://ru.aliexpress.com");
    }

    #[tokio::test]
    async fn test_untrack_redirect_to_query_param_tracker() {
        let target = MockServer::start_async().await;
        let untouched = target
            .mock_async(|when, then| {
                when.any_request();
                then.status(500);
            })
            .await;

        let dirty = "https://ru.aliexpress.com/store?a=A&SearchText=phone&b=B&c=C";
        let tracker_url = Url::parse_with_params(&target.url("/"), &[("ulp", dirty)]).unwrap();

        let redirect = MockServer::start_async().await;
        redirect
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(302).header("Location", tracker_url.as_str());
            })
            .await;

        let resolver = Resolver::builder()
            .tracker(target.address().to_string(), builtin_strategy("ad.admitad.com"))
            .build()
            .unwrap();
        let clean = resolver.untrack(&redirect.url("/")).await.unwrap();

        untouched.assert_hits_async(0).await;
        assert_eq!(clean, "https://ru.aliexpress.com/store?SearchText=phone");
    }

    #[tokio::test]
    async fn test_untrack_script_redirect() {
        let tracker = MockServer::start_async().await;
        let page = tracker
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200).body(SCRIPT_PAGE.replace(
                    "SCRIPT",
                    "window.location = 'http://www.gearbest.com/cell-phones/pp_470619.html?wid=21&utm_source=epn';",
                ));
            })
            .await;

        let redirect = MockServer::start_async().await;
        redirect
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(302).header("Location", tracker.url("/"));
            })
            .await;

        let resolver = Resolver::builder()
            .tracker(tracker.address().to_string(), builtin_strategy("epnclick.ru"))
            .build()
            .unwrap();
        let clean = resolver.untrack(&redirect.url("/")).await.unwrap();

        page.assert_async().await;
        assert_eq!(clean, "http://www.gearbest.com/cell-phones/pp_470619.html");
    }

    #[tokio::test]
    async fn test_untrack_script_redirect_with_to() {
        let tracker = MockServer::start_async().await;
        tracker
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200).body(SCRIPT_PAGE.replace(
                    "SCRIPT",
                    "document.location='/redirect/cpa/o/p5brt6my0anysg50o8syzaw1yyu1mhxv/?to=https%3A%2F%2Ftmall.aliexpress.com%2Fw%2Fwholesale-multicooker.html%3Fspm%3Da2g02.9334986.kitchen-appliances.8.21154eaexojb3q%26site%3Drus%26SearchText%3Dmulticooker%26needQuery%3Dn%26g%3Dy';",
                ));
            })
            .await;

        let resolver = Resolver::builder()
            .tracker(tracker.address().to_string(), builtin_strategy("shopeasy.by"))
            .build()
            .unwrap();
        let clean = resolver.untrack(&tracker.url("/")).await.unwrap();

        assert_eq!(clean, "https://tmall.aliexpress.com/w/wholesale-multicooker.html?SearchText=multicooker");
    }

    async fn redirect_chain(server: &MockServer, redirects: usize) {
        for i in 0..redirects {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(format!("/hop/{i}"));
                    then.status(302).header("Location", format!("/hop/{}", i + 1));
                })
                .await;
        }
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/hop/{redirects}"));
                then.status(200).body("landed");
            })
            .await;
    }

    #[tokio::test]
    async fn test_follow_short_chain() {
        let server = MockServer::start_async().await;
        redirect_chain(&server, 9).await;

        let url = Url::parse(&server.url("/hop/0")).unwrap();
        let resolved = resolver().follow(url).await.unwrap();

        assert_eq!(resolved.path(), "/hop/9");
    }

    #[tokio::test]
    async fn test_follow_exactly_max_redirects() {
        let server = MockServer::start_async().await;
        redirect_chain(&server, MAX_REDIRECTS).await;

        let url = Url::parse(&server.url("/hop/0")).unwrap();
        let resolved = resolver().follow(url).await.unwrap();

        assert_eq!(resolved.path(), format!("/hop/{MAX_REDIRECTS}"));
    }

    #[tokio::test]
    async fn test_follow_too_many_redirects() {
        let server = MockServer::start_async().await;
        redirect_chain(&server, MAX_REDIRECTS + 1).await;

        let url = Url::parse(&server.url("/hop/0")).unwrap();
        let err = resolver().follow(url).await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::MaxRedirects));
    }

    #[tokio::test]
    async fn test_follow_redirect_without_location() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/broken");
                then.status(302);
            })
            .await;

        let url = Url::parse(&server.url("/broken")).unwrap();
        let resolved = resolver().follow(url.clone()).await.unwrap();

        assert_eq!(resolved, url);
    }

    #[tokio::test]
    async fn test_follow_non_ascii_location() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/r");
                then.status(302).header("Location", "/каталог/item");
            })
            .await;
        let landing = server
            .mock_async(|when, then| {
                when.method(GET).path_contains("item");
                then.status(200);
            })
            .await;

        let url = Url::parse(&server.url("/r")).unwrap();
        let resolved = resolver().follow(url).await.unwrap();

        landing.assert_hits_async(1).await;
        assert_eq!(resolved.path(), "/%D0%BA%D0%B0%D1%82%D0%B0%D0%BB%D0%BE%D0%B3/item");
    }

    #[tokio::test]
    async fn test_follow_shop_is_not_fetched() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let resolver = Resolver::builder()
            .shop(server.address().to_string(), CleanupRule::deny(["wid"]))
            .build()
            .unwrap();
        let clean = resolver.untrack(&server.url("/p/1.html?wid=21&color=red")).await.unwrap();

        mock.assert_hits_async(0).await;
        assert_eq!(clean, server.url("/p/1.html?color=red"));
    }

    #[tokio::test]
    async fn test_untrack_unknown_host_passthrough() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/landing");
                then.status(200);
            })
            .await;

        let clean = resolver().untrack(&server.url("/landing?utm_source=x")).await.unwrap();
        assert_eq!(clean, server.url("/landing?utm_source=x"));
    }

    #[tokio::test]
    async fn test_untrack_unknown_host_keeps_root_slash() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let clean = resolver().untrack(&server.url("/")).await.unwrap();
        assert_eq!(clean, server.url("/"));
    }

    #[tokio::test]
    async fn test_untrack_unknown_host_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/landing");
                then.status(200);
            })
            .await;

        let resolver = Resolver::builder().policy(UnknownHostPolicy::Reject).build().unwrap();
        let err = resolver.untrack(&server.url("/landing")).await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::UnknownShop));
    }

    #[tokio::test]
    async fn test_untrack_invalid_input() {
        let err = resolver().untrack("   ").await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidUrl));
    }

    #[test]
    fn test_resolver_from_config() {
        let config = AppConfig { strict: true, ..Default::default() };
        let resolver = Resolver::new(&config).unwrap();
        assert_eq!(resolver.policy(), UnknownHostPolicy::Reject);
        assert!(resolver.trackers().contains("epnclick.ru"));
        assert!(resolver.shops().contains("letyshops.ru"));
    }
}
