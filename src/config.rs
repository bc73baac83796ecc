//! Bridge configuration.
//!
//! Everything here is plain data: it can be built in code or loaded from a
//! TOML file. Collaborators (gatherer, logger) are attached separately on the
//! [`BridgeBuilder`](crate::graphite::BridgeBuilder).
//!
//! ```toml
//! target_address = "graphite.internal:2003"
//! prefix = "prod.web01."
//! push_interval_secs = 10
//! push_timeout_secs = 5
//! error_handling = "abort"
//! counters_as_delta = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::BridgeError;

pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Namespace tokens stripped from the front of metric names.
pub const DEFAULT_TRIM_PREFIXES: &[&str] = &["grafana_"];

/// Category tokens whose trailing `_` becomes a Graphite folder separator.
/// Checked in order; the first match wins.
pub const DEFAULT_CATEGORY_PREFIXES: &[&str] = &[
    "proxy_",
    "api_",
    "page_",
    "alerting_",
    "aws_",
    "db_",
    "stat_",
    "go_",
    "process_",
];

/// What a push does when the gatherer fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Log the failure and push whatever was gathered.
    #[default]
    #[serde(alias = "continue")]
    ContinueOnError,
    /// Return the gather error without touching the network.
    #[serde(alias = "abort")]
    AbortOnError,
}

/// Static bridge settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// `host:port` of the Graphite plaintext listener. Required.
    pub target_address: String,
    /// Prepended to every path. Include the trailing `.` yourself.
    pub prefix: String,
    #[serde(rename = "push_interval_secs", deserialize_with = "duration_secs")]
    pub push_interval: Duration,
    /// Bounds the connect and, separately, the write phase of a push.
    #[serde(rename = "push_timeout_secs", deserialize_with = "duration_secs")]
    pub push_timeout: Duration,
    pub error_handling: ErrorHandling,
    pub counters_as_delta: bool,
    pub trim_prefixes: Vec<String>,
    pub category_prefixes: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            target_address: String::new(),
            prefix: String::new(),
            push_interval: DEFAULT_PUSH_INTERVAL,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            error_handling: ErrorHandling::default(),
            counters_as_delta: false,
            trim_prefixes: DEFAULT_TRIM_PREFIXES.iter().map(|s| s.to_string()).collect(),
            category_prefixes: DEFAULT_CATEGORY_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BridgeConfig {
    /// Defaults with the given target.
    pub fn new(target_address: impl Into<String>) -> Self {
        Self {
            target_address: target_address.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, BridgeError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| BridgeError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check required fields and replace zero durations with the defaults.
    pub fn validated(mut self) -> Result<Self, BridgeError> {
        if self.target_address.trim().is_empty() {
            return Err(BridgeError::Config("target address is required".into()));
        }
        if self.push_interval.is_zero() {
            self.push_interval = DEFAULT_PUSH_INTERVAL;
        }
        if self.push_timeout.is_zero() {
            self.push_timeout = DEFAULT_PUSH_TIMEOUT;
        }
        Ok(self)
    }
}

fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
