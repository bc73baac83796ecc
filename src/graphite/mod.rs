//! # Graphite Bridge
//!
//! Pushes gathered metric families to a Graphite plaintext listener.
//!
//! ## What It Does
//!
//! 1. **Gather**: asks the injected [`Gatherer`](crate::gatherer::Gatherer) for a snapshot.
//! 2. **Encode**: renders every sample as `<path> <value> <unix_seconds>\n`,
//!    optionally turning counters into per-push deltas.
//! 3. **Push**: opens one TCP connection, streams the lines, closes it.
//! 4. **Schedule**: repeats on a fixed interval until cancelled.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let bridge = Arc::new(
//!     Bridge::builder("127.0.0.1:2003")
//!         .gatherer(registry)
//!         .push_interval(Duration::from_secs(10))
//!         .build()?,
//! );
//! let cancel = CancellationToken::new();
//! tokio::spawn({
//!     let bridge = Arc::clone(&bridge);
//!     let cancel = cancel.clone();
//!     async move { bridge.run(cancel).await }
//! });
//! ```

pub mod bridge;
pub mod delta;
pub mod encoder;
pub mod sanitize;

pub use bridge::{Bridge, BridgeBuilder, PushStats};
pub use delta::{DeltaTable, Fingerprint};
pub use encoder::{format_value, LineEncoder};
pub use sanitize::{sanitize, sanitize_prefix, NameRules};
