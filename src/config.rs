//! # Runtime configuration
//!
//! Hierarchical configuration loading from:
//! - built-in defaults
//! - `config.toml` (base configuration)
//! - `config.local.toml` (git-ignored local overrides)
//! - environment variables (`RUNTIME_*` prefix, `__` as the nesting
//!   separator)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [channel]
//! capacity = 1024
//!
//! [reporter]
//! history_capacity = 10
//! rate_limit_immediate = 3
//! rate_limit_interval_secs = 2
//! ```
//!
//! ```bash
//! RUNTIME_CHANNEL__CAPACITY=4096
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load runtime configuration: {0}")]
    Load(#[from] figment::Error),
}

/// Top-level runtime configuration: the ambient tunables that sit outside
/// any single controller's declarative spec (spec §2.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Request-channel sizing for the controller worker loop (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_capacity")]
    pub capacity: usize,
}

/// Error reporter shape (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_rate_limit_immediate")]
    pub rate_limit_immediate: u32,
    #[serde(default = "default_rate_limit_interval_secs")]
    pub rate_limit_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"info"` or
    /// `"controller_runtime=debug,warn"`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_history_capacity() -> usize {
    crate::reporter::HISTORY_CAPACITY
}

fn default_rate_limit_immediate() -> u32 {
    3
}

fn default_rate_limit_interval_secs() -> u64 {
    2
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            capacity: default_channel_capacity(),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            history_capacity: default_history_capacity(),
            rate_limit_immediate: default_rate_limit_immediate(),
            rate_limit_interval_secs: default_rate_limit_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: default_log_filter(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            channel: ChannelConfig::default(),
            reporter: ReporterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the default locations, merged in order:
    /// built-in defaults, `config.toml`, `config.local.toml`, then
    /// `RUNTIME_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Figment::from(figment::providers::Serialized::defaults(
            RuntimeConfig::default(),
        ))
        .merge(Toml::file("config.toml"))
        .merge(Toml::file("config.local.toml"))
        .merge(Env::prefixed("RUNTIME_").split("__"))
        .extract()?)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Ok(Figment::from(figment::providers::Serialized::defaults(
            RuntimeConfig::default(),
        ))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RUNTIME_").split("__"))
        .extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.channel.capacity, 1024);
        assert_eq!(config.reporter.history_capacity, 10);
        assert_eq!(config.reporter.rate_limit_immediate, 3);
        assert_eq!(config.reporter.rate_limit_interval_secs, 2);
    }

    #[test]
    fn file_override_takes_precedence_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[channel]\ncapacity = 2048\n").unwrap();

        let config = RuntimeConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.channel.capacity, 2048);
        assert_eq!(config.reporter.rate_limit_immediate, 3);
    }
}
