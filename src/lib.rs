//! # graphite-bridge
//!
//! Bridges a pull-based metric registry (counters, gauges, summaries,
//! histograms) to Graphite's plaintext line protocol. A [`Bridge`] gathers a
//! snapshot on a fixed interval, encodes it, and pushes it over a fresh TCP
//! connection.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use graphite_bridge::{Bridge, Metric, MetricFamily, MetricKind, Registry};
//!
//! # async fn demo() -> Result<(), graphite_bridge::BridgeError> {
//! let registry = Arc::new(Registry::new());
//! registry.register(Arc::new(|| {
//!     vec![MetricFamily::new("api_requests_total", MetricKind::Counter)
//!         .with_metric(Metric::counter(42.0).with_label("code", "200"))]
//! }));
//!
//! let bridge = Bridge::builder("127.0.0.1:2003")
//!     .prefix("prod.web01.")
//!     .gatherer(registry)
//!     .build()?;
//! bridge.push().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gatherer;
pub mod graphite;
pub mod logger;
pub mod model;

pub use config::{BridgeConfig, ErrorHandling};
pub use error::{BridgeError, GatherError};
pub use gatherer::{Collector, Gatherer, ProcessCollector, Registry};
pub use graphite::{Bridge, BridgeBuilder, LineEncoder, PushStats};
pub use logger::{Logger, TracingLogger};
pub use model::{Bucket, LabelPair, Metric, MetricFamily, MetricKind, MetricValue, Quantile, Sample};
