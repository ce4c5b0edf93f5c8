//! Property-based tests for the analysis core
//!
//! Covers the invariants that must hold for any input:
//! 1. Self-time attribution never goes negative
//! 2. Critical-path duration never exceeds wall-clock duration and the
//!    parallelism ratio never drops below 1.0
//! 3. Percentiles stay inside the sample range
//! 4. Template mining is deterministic across runs
//! 5. The comparator never loses or invents spans

use indagar::critical_path;
use indagar::log_patterns::{LogClusterConfig, LogRecord, LogSeverity, TemplateMiner};
use indagar::span_record::{SpanRecord, Trace};
use indagar::stats;
use indagar::trace_forest::TraceForest;
use proptest::prelude::*;

/// Root at [0, 1000] with children nested strictly inside it.
fn nested_trace(intervals: &[(f64, f64)]) -> Trace {
    let mut spans = vec![SpanRecord::new("root", None, "root.op", 0.0, 1000.0)];
    for (i, &(a, b)) in intervals.iter().enumerate() {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        spans.push(SpanRecord::new(
            format!("c{i}"),
            Some("root"),
            format!("child.op{}", i % 4),
            start,
            end,
        ));
    }
    Trace::new("prop", spans)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_self_times_never_negative(
        intervals in prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 0..20),
    ) {
        let forest = TraceForest::from_trace(&nested_trace(&intervals)).unwrap();
        for self_time in critical_path::self_times(&forest) {
            prop_assert!(self_time >= 0.0);
            prop_assert!(self_time.is_finite());
        }
    }

    #[test]
    fn prop_critical_path_bounded_by_wall_clock(
        intervals in prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 0..20),
    ) {
        let forest = TraceForest::from_trace(&nested_trace(&intervals)).unwrap();
        let result = critical_path::analyze(&forest);

        prop_assert!(result.critical_path_duration_ms <= result.total_duration_ms + 1e-6);
        prop_assert!(result.parallelism_ratio >= 1.0 - 1e-9);

        let max_self = critical_path::self_times(&forest)
            .into_iter()
            .fold(0.0f64, f64::max);
        prop_assert!(result.critical_path_duration_ms >= max_self - 1e-6);
        prop_assert!((0.0..=100.0).contains(&result.parallelism_pct));
        for node in &result.nodes {
            prop_assert!(node.self_time_ms >= 0.0);
            prop_assert!((0.0..=100.0 + 1e-6).contains(&node.contribution_pct));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_percentile_within_sample_range(
        samples in prop::collection::vec(0.0f64..10_000.0, 1..100),
        p in 0.0f64..=100.0,
    ) {
        let value = stats::percentile(&samples, p);
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(value >= min - 1e-9);
        prop_assert!(value <= max + 1e-9);
    }

    #[test]
    fn prop_percentiles_are_monotonic(
        samples in prop::collection::vec(0.0f64..10_000.0, 1..100),
    ) {
        let p50 = stats::percentile(&samples, 50.0);
        let p90 = stats::percentile(&samples, 90.0);
        let p99 = stats::percentile(&samples, 99.0);
        prop_assert!(p50 <= p90 + 1e-9);
        prop_assert!(p90 <= p99 + 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_template_mining_is_deterministic(
        messages in prop::collection::vec("[a-z]{1,8}( [a-z0-9]{1,8}){0,6}", 0..40),
    ) {
        let records: Vec<LogRecord> = messages
            .iter()
            .map(|m| LogRecord::new(0.0, LogSeverity::Info, m.clone()))
            .collect();

        let config = LogClusterConfig::default();
        let mut first = TemplateMiner::new(&config);
        let ids_a: Vec<usize> = records.iter().map(|r| first.observe(r)).collect();
        let mut second = TemplateMiner::new(&config);
        let ids_b: Vec<usize> = records.iter().map(|r| second.observe(r)).collect();

        prop_assert_eq!(ids_a, ids_b);
        prop_assert_eq!(first.len(), second.len());
    }

    #[test]
    fn prop_comparator_accounts_for_every_span(
        base_count in 1usize..15,
        target_count in 1usize..15,
    ) {
        // Disjoint IDs force name+ordinal matching.
        let base_spans: Vec<SpanRecord> = (0..base_count)
            .map(|i| SpanRecord::new(format!("b{i}"), None, "op", i as f64 * 10.0, i as f64 * 10.0 + 5.0))
            .collect();
        let target_spans: Vec<SpanRecord> = (0..target_count)
            .map(|i| SpanRecord::new(format!("t{i}"), None, "op", i as f64 * 10.0, i as f64 * 10.0 + 5.0))
            .collect();

        let base = TraceForest::from_trace(&Trace::new("b", base_spans)).unwrap();
        let target = TraceForest::from_trace(&Trace::new("t", target_spans)).unwrap();
        let diff = indagar::comparator::compare(&base, &target, 1.0);

        // Same-name spans pair up positionally; the surplus on either side
        // must surface as structure diffs.
        let expected_unmatched = base_count.abs_diff(target_count);
        prop_assert_eq!(diff.structure_diffs.len(), expected_unmatched);
        prop_assert!(diff.latency_diffs.is_empty());
    }
}
