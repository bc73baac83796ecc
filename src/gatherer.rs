//! Metric sources consumed by the bridge.
//!
//! A [`Gatherer`] returns a point-in-time snapshot of metric families. The
//! bridge holds one explicitly; there is no process-wide default registry.
//! [`Registry`] is the stock implementation: a set of [`Collector`]s whose
//! output is merged and sorted by family name.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::GatherError;
use crate::model::{Metric, MetricFamily, MetricKind};

/// Pull-based source of metric families.
pub trait Gatherer: Send + Sync {
    /// Snapshot the current metric state.
    ///
    /// On failure the returned [`GatherError`] may still carry the families
    /// that were collected successfully.
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError>;
}

impl<F> Gatherer for F
where
    F: Fn() -> Result<Vec<MetricFamily>, GatherError> + Send + Sync,
{
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        self()
    }
}

/// Something that contributes families to a [`Registry`].
pub trait Collector: Send + Sync {
    fn collect(&self) -> Vec<MetricFamily>;
}

impl<F> Collector for F
where
    F: Fn() -> Vec<MetricFamily> + Send + Sync,
{
    fn collect(&self) -> Vec<MetricFamily> {
        self()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Thread-safe collection of collectors.
///
/// Family names must be unique across collectors. A duplicate makes
/// [`gather`](Gatherer::gather) fail, with every first-seen family returned as
/// the partial result.
#[derive(Default)]
pub struct Registry {
    collectors: RwLock<Vec<Arc<dyn Collector>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, collector: Arc<dyn Collector>) {
        if let Ok(mut collectors) = self.collectors.write() {
            collectors.push(collector);
        }
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.collectors.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Gatherer for Registry {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        let collectors = self
            .collectors
            .read()
            .map_err(|_| GatherError::new("registry lock poisoned"))?;

        let mut by_name: BTreeMap<String, MetricFamily> = BTreeMap::new();
        let mut duplicates: Vec<String> = Vec::new();
        for collector in collectors.iter() {
            for family in collector.collect() {
                if by_name.contains_key(&family.name) {
                    duplicates.push(family.name);
                } else {
                    by_name.insert(family.name.clone(), family);
                }
            }
        }

        let families: Vec<MetricFamily> = by_name.into_values().collect();
        if duplicates.is_empty() {
            Ok(families)
        } else {
            Err(GatherError::with_partial(
                format!("duplicate metric families: {}", duplicates.join(", ")),
                families,
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessCollector
// ---------------------------------------------------------------------------

/// Reports the process start time as `process_start_time_seconds`.
pub struct ProcessCollector {
    start_time_secs: f64,
}

impl ProcessCollector {
    pub fn new() -> Self {
        let start_time_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self { start_time_secs }
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ProcessCollector {
    fn collect(&self) -> Vec<MetricFamily> {
        vec![MetricFamily::new("process_start_time_seconds", MetricKind::Gauge)
            .with_help("Start time of the process since unix epoch in seconds.")
            .with_metric(Metric::gauge(self.start_time_secs.floor()))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge(name: &str, v: f64) -> MetricFamily {
        MetricFamily::new(name, MetricKind::Gauge).with_metric(Metric::gauge(v))
    }

    #[test]
    fn empty_registry_gathers_nothing() {
        let reg = Registry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.gather().unwrap(), Vec::<MetricFamily>::new());
    }

    #[test]
    fn registry_sorts_families_by_name() {
        let reg = Registry::new();
        reg.register(Arc::new(|| vec![gauge("zeta", 1.0), gauge("alpha", 2.0)]));
        reg.register(Arc::new(|| vec![gauge("mid", 3.0)]));
        assert_eq!(reg.len(), 2);

        let names: Vec<String> = reg.gather().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn registry_duplicate_family_is_error_with_partial() {
        let reg = Registry::new();
        reg.register(Arc::new(|| vec![gauge("up", 1.0)]));
        reg.register(Arc::new(|| vec![gauge("up", 0.0), gauge("other", 5.0)]));

        let err = reg.gather().unwrap_err();
        assert!(err.message().contains("up"), "message: {}", err.message());
        let partial = err.partial();
        assert_eq!(partial.len(), 2);
        // first registration wins
        let up = partial.iter().find(|f| f.name == "up").unwrap();
        assert_eq!(up.metrics[0], Metric::gauge(1.0));
    }

    #[test]
    fn closure_is_a_gatherer() {
        let g = || -> Result<Vec<MetricFamily>, GatherError> { Err(GatherError::new("nope")) };
        assert_eq!(g.gather().unwrap_err().message(), "nope");
    }

    #[test]
    fn process_collector_reports_start_time() {
        let fams = ProcessCollector::new().collect();
        assert_eq!(fams.len(), 1);
        assert_eq!(fams[0].name, "process_start_time_seconds");
        assert_eq!(fams[0].kind, MetricKind::Gauge);
        let samples = fams[0].samples(0);
        assert!(samples[0].value > 1_600_000_000.0);
        assert_eq!(samples[0].value.fract(), 0.0);
    }
}
