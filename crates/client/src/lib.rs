//! Resolution engine for untrack-url.
//!
//! This crate provides the HTTP fetch layer, tracker strategies, script
//! redirect extraction, and the [`Resolver`] that ties them together.

pub mod extract;
pub mod fetch;
pub mod resolve;
pub mod tracker;

pub use extract::{fetch_script_redirect, find_script_redirect};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Hop, normalize_input};
pub use resolve::{MAX_REDIRECTS, Resolver, ResolverBuilder};
pub use tracker::{Extract, Strategy, TrackerRegistry};
