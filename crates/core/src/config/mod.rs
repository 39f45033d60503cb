//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (UNTRACK_*)
//! 2. TOML config file (if UNTRACK_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Tracker and shop tables are built into the binary and are not configurable here.

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// What to do when a resolved host has no cleanup rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownHostPolicy {
    /// Return the resolved URL as-is.
    #[default]
    Passthrough,
    /// Fail with `ErrorKind::UnknownShop`.
    Reject,
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-request timeout in milliseconds, applied to every outbound GET.
    ///
    /// Set via UNTRACK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional User-Agent header. No header is sent when unset.
    ///
    /// Set via UNTRACK_USER_AGENT environment variable.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Treat a resolved host without a cleanup rule as a failure.
    ///
    /// Set via UNTRACK_STRICT environment variable.
    #[serde(default)]
    pub strict: bool,
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { timeout_ms: default_timeout_ms(), user_agent: None, strict: false }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn unknown_host_policy(&self) -> UnknownHostPolicy {
        if self.strict { UnknownHostPolicy::Reject } else { UnknownHostPolicy::Passthrough }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `UNTRACK_`
    /// 2. TOML file from `UNTRACK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or parsed, or if
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("UNTRACK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("UNTRACK_").ignore(&["config_file"]));

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
