//! Metric family → Graphite plaintext lines.
//!
//! ## Wire format
//! ```text
//! <path> <value> <unix_seconds>\n
//! ```
//!
//! ## Path
//! `[prefix]` + rewritten metric name + one `.label.value` segment per label
//! (sorted by the `"label value"` string) + a rollup suffix chosen by kind:
//!
//! | Kind      | `.count`             | `.sum`          |
//! |-----------|----------------------|-----------------|
//! | Counter   | always               | never           |
//! | Summary   | `_count` sample      | never           |
//! | Histogram | `_count` sample      | `_sum` sample   |
//! | Gauge     | never                | never           |
//!
//! The suffix lets Graphite pick a different aggregation method per series.

use crate::graphite::delta::{DeltaTable, Fingerprint};
use crate::graphite::sanitize::{sanitize_prefix, write_sanitized, NameRules};
use crate::model::{LabelPair, MetricFamily, MetricKind, Sample, METRIC_NAME_LABEL};

const MILLISECONDS_PER_SECOND: i64 = 1000;

/// Renders families into line protocol text.
#[derive(Debug, Clone)]
pub struct LineEncoder {
    prefix: String,
    rules: NameRules,
    counters_as_delta: bool,
}

impl LineEncoder {
    /// `prefix` is sanitized once here and prepended verbatim to every path.
    pub fn new(prefix: &str, rules: NameRules, counters_as_delta: bool) -> Self {
        Self {
            prefix: sanitize_prefix(prefix),
            rules,
            counters_as_delta,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn counters_as_delta(&self) -> bool {
        self.counters_as_delta
    }

    /// Append every line of `family` to `out` and return how many were written.
    ///
    /// NaN samples are skipped before any delta bookkeeping. In delta mode each
    /// counter (and summary `_count`) sample updates `deltas` exactly once, so
    /// a family must be encoded at most once per push.
    pub fn encode_family(
        &self,
        family: &MetricFamily,
        deltas: &mut DeltaTable,
        now_ms: i64,
        out: &mut String,
    ) -> usize {
        let mut lines = 0;
        for sample in family.samples(now_ms) {
            if sample.value.is_nan() {
                continue;
            }
            out.push_str(&self.prefix);
            self.write_path(out, &sample);
            if let Some(suffix) = rollup_suffix(family.kind, &sample.name) {
                out.push_str(suffix);
            }

            let value = self.outgoing_value(family.kind, &sample, deltas);
            out.push(' ');
            out.push_str(&format_value(value));
            out.push(' ');
            out.push_str(&(sample.timestamp_ms / MILLISECONDS_PER_SECOND).to_string());
            out.push('\n');
            lines += 1;
        }
        lines
    }

    /// Encode a batch of families into one string. Handy for tests and
    /// non-network sinks.
    pub fn encode(&self, families: &[MetricFamily], deltas: &mut DeltaTable, now_ms: i64) -> String {
        let mut out = String::new();
        for family in families {
            self.encode_family(family, deltas, now_ms, &mut out);
        }
        out
    }

    fn write_path(&self, out: &mut String, sample: &Sample) {
        self.rules.write_name(out, &sample.name);

        let mut labels: Vec<&LabelPair> = sample
            .labels
            .iter()
            .filter(|l| l.name != METRIC_NAME_LABEL)
            .collect();
        labels.sort_by_cached_key(|l| format!("{} {}", l.name, l.value));
        for label in labels {
            out.push('.');
            write_sanitized(out, &label.name);
            out.push('.');
            write_sanitized(out, &label.value);
        }
    }

    fn outgoing_value(&self, kind: MetricKind, sample: &Sample, deltas: &mut DeltaTable) -> f64 {
        if !self.counters_as_delta {
            return sample.value;
        }
        let tracked = match kind {
            MetricKind::Counter => true,
            MetricKind::Summary => sample.name.ends_with("_count"),
            _ => false,
        };
        if tracked {
            deltas.delta(Fingerprint::of(&sample.name, &sample.labels), sample.value)
        } else {
            sample.value
        }
    }
}

fn rollup_suffix(kind: MetricKind, sample_name: &str) -> Option<&'static str> {
    match kind {
        MetricKind::Counter => Some(".count"),
        MetricKind::Summary | MetricKind::Histogram if sample_name.ends_with("_count") => Some(".count"),
        MetricKind::Histogram if sample_name.ends_with("_sum") => Some(".sum"),
        _ => None,
    }
}

/// Shortest round-trip rendering with `%g` exponent rules: plain decimal for
/// exponents in `-4..6`, otherwise `d.ddde±XX`.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{v:e}");
    let parsed = sci
        .split_once('e')
        .and_then(|(mantissa, exp)| exp.parse::<i32>().ok().map(|exp| (mantissa, exp)));
    match parsed {
        Some((mantissa, exp)) if !(-4..6).contains(&exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        _ => format!("{v}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bucket, Metric, Quantile};
    use rstest::rstest;

    const TS: i64 = 1_700_000_000_999;

    fn encoder() -> LineEncoder {
        LineEncoder::new("", NameRules::default(), false)
    }

    fn lines(enc: &LineEncoder, fam: &MetricFamily, deltas: &mut DeltaTable) -> Vec<String> {
        let mut out = String::new();
        enc.encode_family(fam, deltas, TS, &mut out);
        out.lines().map(str::to_string).collect()
    }

    #[rstest]
    #[case(1.0, "1")]
    #[case(0.5, "0.5")]
    #[case(-2.25, "-2.25")]
    #[case(100000.0, "100000")]
    #[case(123456.7, "123456.7")]
    #[case(1e6, "1e+06")]
    #[case(1234567.0, "1.234567e+06")]
    #[case(0.0001, "0.0001")]
    #[case(0.00001, "1e-05")]
    #[case(1.5e-7, "1.5e-07")]
    #[case(1e100, "1e+100")]
    #[case(0.0, "0")]
    #[case(f64::INFINITY, "+Inf")]
    #[case(f64::NEG_INFINITY, "-Inf")]
    fn format_value_matches_percent_g(#[case] v: f64, #[case] expected: &str) {
        assert_eq!(format_value(v), expected);
    }

    #[test]
    fn timestamp_is_truncated_to_seconds() {
        let fam = MetricFamily::new("temp", MetricKind::Gauge).with_metric(Metric::gauge(3.0));
        let got = lines(&encoder(), &fam, &mut DeltaTable::new());
        assert_eq!(got, vec!["temp 3 1700000000"]);
    }

    #[test]
    fn labels_sorted_and_sanitized() {
        let fam = MetricFamily::new("http_requests", MetricKind::Gauge).with_metric(
            Metric::gauge(1.0)
                .with_label("path", "/api/v1")
                .with_label("method", "GET"),
        );
        let got = lines(&encoder(), &fam, &mut DeltaTable::new());
        assert_eq!(got, vec!["http_requests.method.GET.path._api_v1 1 1700000000"]);
    }

    #[test]
    fn prefix_prepended() {
        let enc = LineEncoder::new("prefix.", NameRules::default(), false);
        let fam = MetricFamily::new("up", MetricKind::Gauge).with_metric(Metric::gauge(1.0));
        let got = lines(&enc, &fam, &mut DeltaTable::new());
        assert_eq!(got, vec!["prefix.up 1 1700000000"]);
        assert_eq!(enc.prefix(), "prefix.");
    }

    #[test]
    fn counter_always_gets_count_suffix() {
        let fam = MetricFamily::new("api_requests_total", MetricKind::Counter)
            .with_metric(Metric::counter(12.0));
        let got = lines(&encoder(), &fam, &mut DeltaTable::new());
        assert_eq!(got, vec!["api.requests_total.count 12 1700000000"]);
    }

    #[test]
    fn summary_suffixes_only_count() {
        let fam = MetricFamily::new("rpc", MetricKind::Summary).with_metric(Metric::summary(
            3,
            9.0,
            vec![Quantile { quantile: 0.99, value: 4.0 }],
        ));
        let got = lines(&encoder(), &fam, &mut DeltaTable::new());
        assert_eq!(
            got,
            vec![
                "rpc.quantile.0_99 4 1700000000",
                "rpc_sum 9 1700000000",
                "rpc_count.count 3 1700000000",
            ]
        );
    }

    #[test]
    fn histogram_suffixes_sum_and_count() {
        let fam = MetricFamily::new("lat", MetricKind::Histogram).with_metric(Metric::histogram(
            2,
            0.3,
            vec![Bucket { upper_bound: 0.5, cumulative_count: 2 }],
        ));
        let got = lines(&encoder(), &fam, &mut DeltaTable::new());
        assert_eq!(
            got,
            vec![
                "lat_bucket.le.0_5 2 1700000000",
                "lat_sum.sum 0.3 1700000000",
                "lat_count.count 2 1700000000",
                "lat_bucket.le._Inf 2 1700000000",
            ]
        );
    }

    #[test]
    fn nan_samples_skipped_without_touching_deltas() {
        let enc = LineEncoder::new("", NameRules::default(), true);
        let fam = MetricFamily::new("c", MetricKind::Counter)
            .with_metric(Metric::counter(f64::NAN))
            .with_metric(Metric::counter(2.0).with_label("k", "v"));
        let mut deltas = DeltaTable::new();
        let got = lines(&enc, &fam, &mut deltas);
        assert_eq!(got, vec!["c.k.v.count 2 1700000000"]);
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn delta_mode_only_touches_counters_and_summary_count() {
        let enc = LineEncoder::new("", NameRules::none(), true);
        let mut deltas = DeltaTable::new();
        let gauge = MetricFamily::new("g", MetricKind::Gauge).with_metric(Metric::gauge(5.0));
        let summary = MetricFamily::new("s", MetricKind::Summary)
            .with_metric(Metric::summary(4, 8.0, vec![Quantile { quantile: 0.5, value: 2.0 }]));

        lines(&enc, &gauge, &mut deltas);
        lines(&enc, &summary, &mut deltas);
        let second_gauge = lines(&enc, &gauge, &mut deltas);
        let second_summary = lines(&enc, &summary, &mut deltas);

        assert_eq!(second_gauge, vec!["g 5 1700000000"]);
        assert_eq!(
            second_summary,
            vec![
                "s.quantile.0_5 2 1700000000",
                "s_sum 8 1700000000",
                "s_count.count 0 1700000000",
            ]
        );
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn delta_mode_sends_histograms_raw() {
        let enc = LineEncoder::new("", NameRules::none(), true);
        let mut deltas = DeltaTable::new();
        let hist = MetricFamily::new("h", MetricKind::Histogram).with_metric(Metric::histogram(
            5,
            2.0,
            vec![Bucket { upper_bound: 1.0, cumulative_count: 3 }],
        ));
        let expected = vec![
            "h_bucket.le.1 3 1700000000",
            "h_sum.sum 2 1700000000",
            "h_count.count 5 1700000000",
            "h_bucket.le._Inf 5 1700000000",
        ];

        assert_eq!(lines(&enc, &hist, &mut deltas), expected);
        assert_eq!(lines(&enc, &hist, &mut deltas), expected);
        assert!(deltas.is_empty());
    }

    #[test]
    fn reserved_name_label_is_not_a_path_segment() {
        let fam = MetricFamily::new("up", MetricKind::Gauge).with_metric(
            Metric::gauge(1.0)
                .with_label(METRIC_NAME_LABEL, "up")
                .with_label("job", "node"),
        );
        assert_eq!(lines(&encoder(), &fam, &mut DeltaTable::new()), vec!["up.job.node 1 1700000000"]);
    }

    #[test]
    fn encode_concatenates_families_in_order() {
        let a = MetricFamily::new("a", MetricKind::Gauge).with_metric(Metric::gauge(1.0));
        let b = MetricFamily::new("b", MetricKind::Gauge).with_metric(Metric::gauge(2.0));
        let text = encoder().encode(&[b, a], &mut DeltaTable::new(), TS);
        assert_eq!(text, "b 2 1700000000\na 1 1700000000\n");
    }

    #[test]
    fn empty_family_emits_nothing() {
        let fam = MetricFamily::new("nothing", MetricKind::Counter);
        let mut out = String::new();
        assert_eq!(encoder().encode_family(&fam, &mut DeltaTable::new(), TS, &mut out), 0);
        assert!(out.is_empty());
    }
}
