//! Core types and shared functionality for untrack-url.
//!
//! This crate provides:
//! - Unified error types
//! - Layered configuration
//! - Shop cleanup rules and their registry
//! - Host keys and URL rendering

pub mod config;
pub mod error;
pub mod location;
pub mod shops;

pub use config::{AppConfig, ConfigError, UnknownHostPolicy};
pub use error::{Error, ErrorKind};
pub use location::{display_url, host_key};
pub use shops::{CleanupRule, QueryRule, ShopRegistry};
