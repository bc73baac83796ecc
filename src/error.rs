//! Error types for the bridge and its gatherer collaborator.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::MetricFamily;

/// Errors returned by [`Bridge`](crate::graphite::Bridge) construction and pushes.
///
/// The push loop never surfaces these to its caller; it logs them and tries
/// again on the next tick. A direct [`push`](crate::graphite::Bridge::push)
/// call receives the error for that single attempt.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A required field is missing or a value is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The TOML configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The TOML configuration could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The gatherer failed and the bridge runs with `AbortOnError`.
    #[error("gather failed: {0}")]
    Gather(#[from] GatherError),

    /// TCP dial to the Graphite listener failed.
    #[error("connection failed to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Connecting or streaming took longer than the push timeout.
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    /// Writing encoded lines to the connection failed.
    #[error("write failed: {0}")]
    Write(#[from] io::Error),
}

/// A failed gather.
///
/// Carries whatever families the gatherer did manage to collect so that a
/// bridge running with `ContinueOnError` can still push them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct GatherError {
    message: String,
    partial: Vec<MetricFamily>,
}

impl GatherError {
    /// An error with no usable families.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: Vec::new(),
        }
    }

    /// An error that still produced some families.
    pub fn with_partial(message: impl Into<String>, partial: Vec<MetricFamily>) -> Self {
        Self {
            message: message.into(),
            partial,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Families collected before the failure.
    pub fn partial(&self) -> &[MetricFamily] {
        &self.partial
    }

    pub fn into_partial(self) -> Vec<MetricFamily> {
        self.partial
    }
}
