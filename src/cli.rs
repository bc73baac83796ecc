use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{BridgeConfig, ErrorHandling};
use crate::error::BridgeError;

#[derive(Parser, Debug)]
#[command(name = "graphite-bridge")]
#[command(version)]
#[command(about = "Push process metrics to a Graphite plaintext listener")]
pub struct Args {
    /// TOML config file; command-line flags override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Graphite listener as host:port
    #[arg(long, short)]
    pub target: Option<String>,

    /// Prefix prepended to every metric path (e.g. "prod.web01.")
    #[arg(long)]
    pub prefix: Option<String>,

    /// Seconds between pushes
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Connect and write timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Send counters as the difference since the previous push
    #[arg(long)]
    pub delta: bool,

    /// Skip the push entirely when gathering fails
    #[arg(long)]
    pub abort_on_error: bool,

    /// Push once and exit
    #[arg(long)]
    pub once: bool,
}

impl Args {
    /// Merge the config file (if any) with command-line overrides.
    pub fn resolve_config(&self) -> Result<BridgeConfig, BridgeError> {
        let mut cfg = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };
        if let Some(target) = &self.target {
            cfg.target_address = target.clone();
        }
        if let Some(prefix) = &self.prefix {
            cfg.prefix = prefix.clone();
        }
        if let Some(secs) = self.interval_secs {
            cfg.push_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.timeout_secs {
            cfg.push_timeout = Duration::from_secs(secs);
        }
        if self.delta {
            cfg.counters_as_delta = true;
        }
        if self.abort_on_error {
            cfg.error_handling = ErrorHandling::AbortOnError;
        }
        Ok(cfg)
    }
}
