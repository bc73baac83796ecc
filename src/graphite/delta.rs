//! Counter-to-delta state.
//!
//! Graphite rollups treat every series like a gauge, so monotonic counters
//! can optionally be sent as the difference since the previous push. The
//! table remembers the last absolute value per series, keyed by a
//! [`Fingerprint`] of the series' full label set.
//!
//! Entries are never evicted; the table is bounded by the number of distinct
//! counter series the gatherer ever reports.

use std::collections::HashMap;

use xxhash_rust::xxh3::Xxh3;

use crate::model::{LabelPair, METRIC_NAME_LABEL};

/// Cannot occur in UTF-8 text, so field boundaries are unambiguous.
const SEPARATOR: u8 = 0xff;

/// Stable 64-bit identity of a series (base name plus labels).
///
/// xxh3 over the label set sorted by name. Collisions are possible in
/// principle and accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(name: &str, labels: &[LabelPair]) -> Self {
        let mut pairs: Vec<(&str, &str)> = labels
            .iter()
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect();
        pairs.push((METRIC_NAME_LABEL, name));
        pairs.sort_unstable();

        let mut hasher = Xxh3::new();
        for (label, value) in pairs {
            hasher.update(label.as_bytes());
            hasher.update(&[SEPARATOR]);
            hasher.update(value.as_bytes());
            hasher.update(&[SEPARATOR]);
        }
        Fingerprint(hasher.digest())
    }
}

/// Last observed absolute value per series.
#[derive(Debug, Default)]
pub struct DeltaTable {
    last: HashMap<Fingerprint, f64>,
}

impl DeltaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `current - previous` (previous defaults to 0) and remember
    /// `current`. Calling this twice for the same observation subtracts twice.
    pub fn delta(&mut self, fingerprint: Fingerprint, current: f64) -> f64 {
        let previous = self.last.insert(fingerprint, current).unwrap_or(0.0);
        current - previous
    }

    pub fn last_value(&self, fingerprint: Fingerprint) -> Option<f64> {
        self.last.get(&fingerprint).copied()
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
