//! Bridge runner: gather, connect, stream, close; on a timer.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{BridgeConfig, ErrorHandling};
use crate::error::BridgeError;
use crate::gatherer::{Gatherer, Registry};
use crate::graphite::delta::DeltaTable;
use crate::graphite::encoder::LineEncoder;
use crate::graphite::sanitize::NameRules;
use crate::logger::Logger;
use crate::model::MetricFamily;

/// What a successful push sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    pub families: usize,
    pub lines: usize,
    pub bytes: usize,
}

/// Pushes gathered metrics to a Graphite plaintext listener.
///
/// Use [`BridgeBuilder`] for construction. Each bridge owns its delta table;
/// two bridges fed by the same gatherer track deltas independently.
pub struct Bridge {
    config: BridgeConfig,
    gatherer: Arc<dyn Gatherer>,
    logger: Option<Arc<dyn Logger>>,
    encoder: LineEncoder,
    /// Held for the whole push, which serializes concurrent callers.
    deltas: Mutex<DeltaTable>,
}

impl Bridge {
    /// Start building a bridge aimed at `target_address` (`host:port`).
    pub fn builder(target_address: impl Into<String>) -> BridgeBuilder {
        BridgeBuilder::new(target_address)
    }

    /// Build a bridge from a config with the default gatherer and no logger.
    pub fn from_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        BridgeBuilder::from_config(config).build()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Gather once and send everything to the target.
    ///
    /// # Returns
    /// - `Ok(PushStats)` once every line was written and flushed. Under
    ///   `AbortOnError` an empty gather returns `Ok` with zeroed stats and no
    ///   connection is made.
    /// - `Err(BridgeError::Gather)` when the gatherer fails under `AbortOnError`.
    /// - `Err(BridgeError::Connect | Timeout)` when the dial fails or exceeds
    ///   the push timeout.
    /// - `Err(BridgeError::Write | Timeout)` on the first failed write; later
    ///   families are not encoded.
    ///
    /// A failure to close the connection is logged, not returned.
    pub async fn push(&self) -> Result<PushStats, BridgeError> {
        let mut deltas = self.deltas.lock().await;

        let families = match self.gatherer.gather() {
            Ok(families) if !families.is_empty() => families,
            Ok(families) => match self.config.error_handling {
                ErrorHandling::AbortOnError => return Ok(PushStats::default()),
                ErrorHandling::ContinueOnError => {
                    self.log("continue on error: gatherer returned no metric families");
                    families
                }
            },
            Err(err) => match self.config.error_handling {
                ErrorHandling::AbortOnError => return Err(err.into()),
                ErrorHandling::ContinueOnError => {
                    self.log(&format!("continue on error: {err}"));
                    err.into_partial()
                }
            },
        };

        let target = &self.config.target_address;
        let after = self.config.push_timeout;
        let stream = match timeout(after, TcpStream::connect(target.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(BridgeError::Connect {
                    target: target.clone(),
                    source,
                })
            }
            Err(_) => return Err(BridgeError::Timeout { stage: "connect", after }),
        };

        let mut writer = BufWriter::new(stream);
        let stats = self
            .write_with_timeout(&mut writer, &families, &mut deltas)
            .await?;

        if let Err(e) = writer.shutdown().await {
            self.log(&format!("error closing connection to {target}: {e}"));
        }

        debug!(
            addr = %target,
            families = stats.families,
            lines = stats.lines,
            bytes = stats.bytes,
            "pushed metrics to graphite"
        );
        Ok(stats)
    }

    /// Push every `push_interval` until `cancel` fires.
    ///
    /// The first push happens one interval after the call. Push errors are
    /// logged and the loop keeps going. Cancellation is checked between ticks
    /// only: an in-flight push always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.config.push_interval;
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or_else(|| far_future(now));
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            addr = %self.config.target_address,
            interval_secs = period.as_secs(),
            "graphite bridge started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("graphite bridge shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.push().await {
                        debug!(error = %e, "graphite push failed, will retry next tick");
                        self.log(&format!("error pushing to Graphite: {e}"));
                    }
                }
            }
        }
    }

    /// [`write_families`](Self::write_families) bounded by the push timeout.
    async fn write_with_timeout<W>(
        &self,
        writer: &mut W,
        families: &[MetricFamily],
        deltas: &mut DeltaTable,
    ) -> Result<PushStats, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let after = self.config.push_timeout;
        match timeout(after, self.write_families(writer, families, deltas, now_ms())).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout { stage: "write", after }),
        }
    }

    /// Encode and write family by family, flushing after each one. Stops at
    /// the first write error.
    async fn write_families<W>(
        &self,
        writer: &mut W,
        families: &[MetricFamily],
        deltas: &mut DeltaTable,
        now_ms: i64,
    ) -> Result<PushStats, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stats = PushStats::default();
        let mut buf = String::new();
        for family in families {
            buf.clear();
            let lines = self.encoder.encode_family(family, deltas, now_ms, &mut buf);
            writer.write_all(buf.as_bytes()).await?;
            writer.flush().await?;
            stats.families += 1;
            stats.lines += lines;
            stats.bytes += buf.len();
        }
        Ok(stats)
    }

    fn log(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log(message);
        }
    }
}

/// Start instant for intervals too long to add to `now`; roughly 30 years out.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86_400 * 365 * 30)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Bridge`].
///
/// # Example
/// ```rust,ignore
/// let bridge = Bridge::builder("graphite.internal:2003")
///     .prefix("prod.web01.")
///     .gatherer(registry)
///     .push_interval(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct BridgeBuilder {
    config: BridgeConfig,
    gatherer: Option<Arc<dyn Gatherer>>,
    logger: Option<Arc<dyn Logger>>,
}

impl BridgeBuilder {
    pub fn new(target_address: impl Into<String>) -> Self {
        Self::from_config(BridgeConfig::new(target_address))
    }

    /// Start from a fully populated config, e.g. one loaded from TOML.
    pub fn from_config(config: BridgeConfig) -> Self {
        Self {
            config,
            gatherer: None,
            logger: None,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Override the push interval (default 15 s). Zero means the default.
    pub fn push_interval(mut self, interval: Duration) -> Self {
        self.config.push_interval = interval;
        self
    }

    /// Override the push timeout (default 15 s). Zero means the default.
    pub fn push_timeout(mut self, timeout: Duration) -> Self {
        self.config.push_timeout = timeout;
        self
    }

    pub fn error_handling(mut self, mode: ErrorHandling) -> Self {
        self.config.error_handling = mode;
        self
    }

    pub fn counters_as_delta(mut self, enabled: bool) -> Self {
        self.config.counters_as_delta = enabled;
        self
    }

    pub fn trim_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.config.trim_prefixes = prefixes;
        self
    }

    pub fn category_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.config.category_prefixes = prefixes;
        self
    }

    /// Source of metric families. Defaults to an empty [`Registry`].
    pub fn gatherer(mut self, gatherer: Arc<dyn Gatherer>) -> Self {
        self.gatherer = Some(gatherer);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// # Errors
    /// [`BridgeError::Config`] when the target address is empty.
    pub fn build(self) -> Result<Bridge, BridgeError> {
        let config = self.config.validated()?;
        let encoder = LineEncoder::new(
            &config.prefix,
            NameRules::new(config.trim_prefixes.clone(), config.category_prefixes.clone()),
            config.counters_as_delta,
        );
        let gatherer = self
            .gatherer
            .unwrap_or_else(|| Arc::new(Registry::new()) as Arc<dyn Gatherer>);

        Ok(Bridge {
            config,
            gatherer,
            logger: self.logger,
            encoder,
            deltas: Mutex::new(DeltaTable::new()),
        })
    }
}
