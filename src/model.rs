//! # Metric Model
//!
//! ## Responsibility
//! The typed metric families a [`Gatherer`](crate::gatherer::Gatherer) hands
//! to the bridge, and their expansion into flat [`Sample`]s.
//!
//! The shape follows the Prometheus exposition model: a family has a name, a
//! kind, and a list of metrics that each carry their own label set. Summaries
//! and histograms expand into several samples (`_sum`, `_count`, one per
//! quantile or bucket).
//!
//! ## NOT Responsible For
//! - Registry semantics (registration, collection, dedup): see `gatherer`
//! - Graphite path rendering: see `graphite::encoder`

use std::fmt;

/// Label that holds the bucket upper bound on histogram `_bucket` samples.
pub const BUCKET_LABEL: &str = "le";

/// Label that holds the quantile on summary samples.
pub const QUANTILE_LABEL: &str = "quantile";

/// Reserved label name under which a sample's base name is fingerprinted.
pub const METRIC_NAME_LABEL: &str = "__name__";

// ---------------------------------------------------------------------------
// Kinds and values
// ---------------------------------------------------------------------------

/// The kind shared by every metric in a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
    Histogram,
    /// No declared type; encoded like a gauge.
    Untyped,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Counter   => "counter",
            MetricKind::Gauge     => "gauge",
            MetricKind::Summary   => "summary",
            MetricKind::Histogram => "histogram",
            MetricKind::Untyped   => "untyped",
        };
        write!(f, "{s}")
    }
}

/// One label name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single summary quantile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

/// A cumulative histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

/// The value carried by one metric. Must match the family's [`MetricKind`];
/// mismatched metrics are skipped during expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(f64),
    Gauge(f64),
    Untyped(f64),
    Summary {
        sample_count: u64,
        sample_sum: f64,
        quantiles: Vec<Quantile>,
    },
    Histogram {
        sample_count: u64,
        sample_sum: f64,
        buckets: Vec<Bucket>,
    },
}

// ---------------------------------------------------------------------------
// Metric / MetricFamily
// ---------------------------------------------------------------------------

/// One labelled metric inside a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub labels: Vec<LabelPair>,
    pub value: MetricValue,
    /// Explicit sample time. When `None` the push time is used.
    pub timestamp_ms: Option<i64>,
}

impl Metric {
    pub fn new(value: MetricValue) -> Self {
        Self {
            labels: Vec::new(),
            value,
            timestamp_ms: None,
        }
    }

    pub fn counter(value: f64) -> Self {
        Self::new(MetricValue::Counter(value))
    }

    pub fn gauge(value: f64) -> Self {
        Self::new(MetricValue::Gauge(value))
    }

    pub fn untyped(value: f64) -> Self {
        Self::new(MetricValue::Untyped(value))
    }

    pub fn summary(sample_count: u64, sample_sum: f64, quantiles: Vec<Quantile>) -> Self {
        Self::new(MetricValue::Summary {
            sample_count,
            sample_sum,
            quantiles,
        })
    }

    pub fn histogram(sample_count: u64, sample_sum: f64, buckets: Vec<Bucket>) -> Self {
        Self::new(MetricValue::Histogram {
            sample_count,
            sample_sum,
            buckets,
        })
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push(LabelPair::new(name, value));
        self
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// A named group of metrics of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub metrics: Vec<Metric>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            kind,
            metrics: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Flatten the family into individual samples.
    ///
    /// Order is deterministic: metrics in declaration order; for summaries the
    /// quantiles, then `_sum`, then `_count`; for histograms the buckets, then
    /// `_sum`, `_count`, and finally an implicit `+Inf` bucket when none of the
    /// declared buckets has an infinite upper bound.
    ///
    /// `default_timestamp_ms` applies to metrics without their own timestamp.
    pub fn samples(&self, default_timestamp_ms: i64) -> Vec<Sample> {
        let mut out = Vec::new();
        for metric in &self.metrics {
            let ts = metric.timestamp_ms.unwrap_or(default_timestamp_ms);
            let sample = |name: String, labels: Vec<LabelPair>, value: f64| Sample {
                name,
                labels,
                value,
                timestamp_ms: ts,
            };

            match (self.kind, &metric.value) {
                (MetricKind::Counter, MetricValue::Counter(v))
                | (MetricKind::Gauge, MetricValue::Gauge(v))
                | (MetricKind::Untyped, MetricValue::Untyped(v)) => {
                    out.push(sample(self.name.clone(), metric.labels.clone(), *v));
                }
                (
                    MetricKind::Summary,
                    MetricValue::Summary {
                        sample_count,
                        sample_sum,
                        quantiles,
                    },
                ) => {
                    for q in quantiles {
                        let mut labels = metric.labels.clone();
                        labels.push(LabelPair::new(QUANTILE_LABEL, float_label(q.quantile)));
                        out.push(sample(self.name.clone(), labels, q.value));
                    }
                    out.push(sample(format!("{}_sum", self.name), metric.labels.clone(), *sample_sum));
                    out.push(sample(
                        format!("{}_count", self.name),
                        metric.labels.clone(),
                        *sample_count as f64,
                    ));
                }
                (
                    MetricKind::Histogram,
                    MetricValue::Histogram {
                        sample_count,
                        sample_sum,
                        buckets,
                    },
                ) => {
                    let bucket_name = format!("{}_bucket", self.name);
                    let mut inf_seen = false;
                    for b in buckets {
                        if b.upper_bound == f64::INFINITY {
                            inf_seen = true;
                        }
                        let mut labels = metric.labels.clone();
                        labels.push(LabelPair::new(BUCKET_LABEL, float_label(b.upper_bound)));
                        out.push(sample(bucket_name.clone(), labels, b.cumulative_count as f64));
                    }
                    out.push(sample(format!("{}_sum", self.name), metric.labels.clone(), *sample_sum));
                    out.push(sample(
                        format!("{}_count", self.name),
                        metric.labels.clone(),
                        *sample_count as f64,
                    ));
                    if !inf_seen {
                        let mut labels = metric.labels.clone();
                        labels.push(LabelPair::new(BUCKET_LABEL, float_label(f64::INFINITY)));
                        out.push(sample(bucket_name, labels, *sample_count as f64));
                    }
                }
                _ => {}
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One flattened value ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Base name, including any `_sum` / `_count` / `_bucket` suffix.
    pub name: String,
    /// Labels excluding the base name.
    pub labels: Vec<LabelPair>,
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Render a bound or quantile the way it appears as a label value:
/// shortest decimal, `+Inf` / `-Inf` / `NaN` for the special values.
pub fn float_label(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{v}")
    }
}
