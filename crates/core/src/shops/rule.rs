//! Per-shop cleanup rules.

use url::{Url, form_urlencoded};

/// What to do with the query string of a destination URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryRule {
    /// Leave the query untouched.
    #[default]
    Keep,
    /// Remove every parameter.
    DropAll,
    /// Remove only the named parameters.
    Deny(Vec<String>),
    /// Keep only the named parameters.
    Allow(Vec<String>),
}

impl QueryRule {
    fn retains(&self, name: &str) -> bool {
        match self {
            QueryRule::Keep => true,
            QueryRule::DropAll => false,
            QueryRule::Deny(names) => !names.iter().any(|n| n == name),
            QueryRule::Allow(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Cleanup applied to URLs of one destination host.
///
/// Query, path and scheme handling are independent of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupRule {
    pub query: QueryRule,
    pub drop_path: bool,
    pub scheme: Option<String>,
}

impl CleanupRule {
    pub fn drop_query() -> Self {
        Self { query: QueryRule::DropAll, ..Default::default() }
    }

    pub fn allow<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { query: QueryRule::Allow(names.into_iter().map(Into::into).collect()), ..Default::default() }
    }

    pub fn deny<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { query: QueryRule::Deny(names.into_iter().map(Into::into).collect()), ..Default::default() }
    }

    pub fn with_drop_path(mut self) -> Self {
        self.drop_path = true;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Apply the rule to a copy of `url`.
    pub fn apply(&self, url: &Url) -> Url {
        let mut cleaned = url.clone();

        match &self.query {
            QueryRule::Keep => {}
            QueryRule::DropAll => cleaned.set_query(None),
            rule => {
                // kept segments are copied verbatim, only names are decoded
                let kept: Vec<&str> = url
                    .query()
                    .unwrap_or_default()
                    .split('&')
                    .filter(|segment| {
                        form_urlencoded::parse(segment.as_bytes())
                            .next()
                            .is_some_and(|(name, _)| rule.retains(&name))
                    })
                    .collect();

                if kept.is_empty() {
                    cleaned.set_query(None);
                } else {
                    cleaned.set_query(Some(&kept.join("&")));
                }
            }
        }

        if self.drop_path {
            cleaned.set_path("");
        }

        if let Some(scheme) = &self.scheme
            && cleaned.set_scheme(scheme).is_err()
        {
            tracing::warn!("cannot switch {} to scheme {:?}", cleaned, scheme);
        }

        cleaned
    }
}
