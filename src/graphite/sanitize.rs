//! Graphite path sanitization.
//!
//! Graphite treats `.` as the hierarchy separator, so every path segment is
//! restricted to `[A-Za-z0-9_:-]`. Anything else becomes `_`, and runs of `_`
//! in the output collapse to one. The prefix is user-supplied and may contain
//! its own separators, so it has a looser rule.

use crate::config::{DEFAULT_CATEGORY_PREFIXES, DEFAULT_TRIM_PREFIXES};

fn is_valid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-')
}

/// Sanitize one path segment.
///
/// Idempotent: the output only contains valid characters and never two `_`
/// in a row.
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    write_sanitized(&mut out, s);
    out
}

/// Append the sanitized form of `s` to `out`.
///
/// Collapsing happens on emit: an `_` is dropped only when the previous
/// character written by this call was also `_`.
pub fn write_sanitized(out: &mut String, s: &str) {
    let mut prev_underscore = false;
    for c in s.chars() {
        let c = if is_valid_char(c) { c } else { '_' };
        if c == '_' {
            if prev_underscore {
                continue;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
        out.push(c);
    }
}

/// Sanitize the line prefix. Spaces and dots become `.`, other invalid
/// characters `_`; nothing is collapsed.
pub fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| match c {
            ' ' | '.' => '.',
            c if is_valid_char(c) => c,
            _ => '_',
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Name rewriting
// ---------------------------------------------------------------------------

/// Prefix rewrites applied to metric names before sanitization.
///
/// 1. The first matching trim token is stripped (`grafana_api_x` → `api_x`).
/// 2. The first matching category token has its trailing `_` rendered as the
///    `.` separator (`api_x` → `api.x`), so categories become Graphite folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRules {
    trim_prefixes: Vec<String>,
    category_prefixes: Vec<String>,
}

impl Default for NameRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_TRIM_PREFIXES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_CATEGORY_PREFIXES.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl NameRules {
    pub fn new(trim_prefixes: Vec<String>, category_prefixes: Vec<String>) -> Self {
        Self {
            trim_prefixes,
            category_prefixes,
        }
    }

    /// Rules that leave names untouched apart from sanitization.
    pub fn none() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Append the rewritten, sanitized metric name to `out`.
    pub fn write_name(&self, out: &mut String, name: &str) {
        let name = self
            .trim_prefixes
            .iter()
            .find_map(|t| name.strip_prefix(t.as_str()))
            .unwrap_or(name);

        for category in &self.category_prefixes {
            let Some(group) = category.strip_suffix('_') else {
                continue;
            };
            if let Some(rest) = name.strip_prefix(category.as_str()) {
                write_sanitized(out, group);
                out.push('.');
                write_sanitized(out, rest);
                return;
            }
        }
        write_sanitized(out, name);
    }

    /// Convenience wrapper around [`write_name`](Self::write_name).
    pub fn render_name(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        self.write_name(&mut out, name);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("with space", "with_space")]
    #[case("dots.are.bad", "dots_are_bad")]
    #[case("a..b", "a_b")]
    #[case("keep:colon-dash_ok", "keep:colon-dash_ok")]
    #[case("a__b", "a_b")]
    #[case("a_.b", "a_b")]
    #[case("0.99", "0_99")]
    #[case("+Inf", "_Inf")]
    #[case("ünïcode", "_n_code")]
    #[case("", "")]
    fn sanitize_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    #[test]
    fn collapse_state_is_per_call() {
        let mut out = String::from("x_");
        write_sanitized(&mut out, "_y");
        assert_eq!(out, "x__y");
    }

    #[rstest]
    #[case("prefix.", "prefix.")]
    #[case("my app ", "my.app.")]
    #[case("a/b", "a_b")]
    #[case("a//b", "a__b")]
    #[case("", "")]
    fn sanitize_prefix_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_prefix(input), expected);
    }

    #[rstest]
    #[case("api_dashboard_save", "api.dashboard_save")]
    #[case("page_response_status_total", "page.response_status_total")]
    #[case("grafana_api_foo", "api.foo")]
    #[case("grafana_plain_metric", "plain_metric")]
    #[case("go_goroutines", "go.goroutines")]
    #[case("process_cpu_seconds_total", "process.cpu_seconds_total")]
    #[case("alerting_active_alerts", "alerting.active_alerts")]
    #[case("apiserver_requests", "apiserver_requests")]
    #[case("api__double", "api._double")]
    #[case("api_", "api.")]
    #[case("other.metric", "other_metric")]
    fn default_name_rules(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(NameRules::default().render_name(input), expected);
    }

    #[test]
    fn trim_applies_once() {
        let rules = NameRules::default();
        assert_eq!(rules.render_name("grafana_grafana_x"), "grafana_x");
    }

    #[test]
    fn first_category_match_wins() {
        let rules = NameRules::new(vec![], vec!["a_".into(), "a_b_".into()]);
        assert_eq!(rules.render_name("a_b_c"), "a.b_c");
    }

    #[test]
    fn category_without_trailing_underscore_is_ignored() {
        let rules = NameRules::new(vec![], vec!["api".into()]);
        assert_eq!(rules.render_name("api_x"), "api_x");
    }

    #[test]
    fn no_rules_only_sanitizes() {
        assert_eq!(NameRules::none().render_name("grafana_api_x y"), "grafana_api_x_y");
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(s in "[ -~]{0,64}") {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once.clone());
        }

        #[test]
        fn sanitize_output_is_valid_path_segment(s in "\\PC{0,32}") {
            let out = sanitize(&s);
            prop_assert!(out.chars().all(is_valid_char));
            prop_assert!(!out.contains("__"));
        }
    }
}
