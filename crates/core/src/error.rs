//! Unified error types for untrack-url.
//!
//! Failures are split into two families:
//!
//! - [`Error::Domain`]: expected outcomes of resolving a dirty link (bad input,
//!   dead tracker, redirect loop, ...). Callers render these as a clean message.
//! - [`Error::Internal`]: anything else. Callers should show full detail and ask
//!   for a bug report.

use std::fmt;

/// Kind of an expected, user-facing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input or intermediate string is not a usable URL.
    InvalidUrl,
    /// Connection or transport failure while fetching.
    Network,
    /// A script redirect page answered with something other than 200 OK.
    UpstreamStatus,
    /// A tracker page or parameter did not yield a destination.
    ExtractFailed,
    /// The redirect (or tracker) chain exceeded its hop bound.
    MaxRedirects,
    /// The resolved host has no cleanup rule and the policy rejects it.
    UnknownShop,
}

impl ErrorKind {
    /// Stable code used as the message prefix.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::UpstreamStatus => "UPSTREAM_STATUS",
            ErrorKind::ExtractFailed => "EXTRACT_FAILED",
            ErrorKind::MaxRedirects => "MAX_REDIRECTS",
            ErrorKind::UnknownShop => "UNKNOWN_SHOP",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unified error type for the resolver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Expected failure with a kind and human readable context.
    #[error("{kind}: {context}")]
    Domain { kind: ErrorKind, context: String },

    /// Unexpected failure (client construction, invariant breakage).
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl Error {
    pub fn domain(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error::Domain { kind, context: context.into() }
    }

    pub fn invalid_url(context: impl Into<String>) -> Self {
        Self::domain(ErrorKind::InvalidUrl, context)
    }

    pub fn network(context: impl Into<String>) -> Self {
        Self::domain(ErrorKind::Network, context)
    }

    pub fn upstream_status(context: impl Into<String>) -> Self {
        Self::domain(ErrorKind::UpstreamStatus, context)
    }

    pub fn extract_failed(context: impl Into<String>) -> Self {
        Self::domain(ErrorKind::ExtractFailed, context)
    }

    pub fn max_redirects(limit: usize) -> Self {
        Self::domain(ErrorKind::MaxRedirects, format!("max redirects ({limit}) followed"))
    }

    pub fn unknown_shop(host: &str) -> Self {
        Self::domain(ErrorKind::UnknownShop, format!("{host:?} not found in known shops"))
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Error::Internal(context.into())
    }

    /// Kind of a domain error, `None` for internal ones.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Domain { kind, .. } => Some(*kind),
            Error::Internal(_) => None,
        }
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, Error::Domain { .. })
    }

    /// Tag the error with the tracker host that produced it.
    ///
    /// Internal errors pass through untouched.
    pub fn with_tracker(self, host: &str) -> Self {
        match self {
            Error::Domain { kind, context } => Error::Domain { kind, context: format!("{host}: {context}") },
            internal => internal,
        }
    }
}
