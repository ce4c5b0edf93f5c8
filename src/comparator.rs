//! Span-level trace comparison
//!
//! Diffs a baseline trace against a target trace and emits tagged diff
//! records:
//!
//! - [`SpanDiff::Latency`] for matched spans whose duration moved more than a
//!   configurable noise floor (default 1 ms)
//! - [`SpanDiff::Error`] for matched spans whose status flipped in either
//!   direction
//! - [`SpanDiff::Structure`] for spans present in only one call graph
//!
//! Spans are matched by `span_id` when the two captures share IDs (stable-ID
//! instrumentation); otherwise by `name` plus ordinal occurrence in start
//! order.

use crate::span_record::SpanStatus;
use crate::trace_forest::TraceForest;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Latency regression or improvement on a matched span
#[derive(Debug, Clone, Serialize)]
pub struct LatencyDiff {
    /// Target-side span identity
    pub span_id: String,
    pub span_name: String,
    pub baseline_duration_ms: f64,
    pub target_duration_ms: f64,
    /// Signed: positive means the target got slower
    pub diff_ms: f64,
    pub diff_percent: f64,
}

/// Status flip on a matched span (ok -> error or error -> ok)
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDiff {
    pub span_id: String,
    pub span_name: String,
    pub baseline_status: SpanStatus,
    pub target_status: SpanStatus,
}

/// Direction of a topology change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureChange {
    /// Present only in the target call graph
    Added,
    /// Present only in the baseline call graph
    Removed,
}

/// Span present in one trace's call graph but absent in the other
#[derive(Debug, Clone, Serialize)]
pub struct StructureDiff {
    pub span_id: String,
    pub span_name: String,
    pub change: StructureChange,
}

/// Tagged diff record
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpanDiff {
    Latency(LatencyDiff),
    Error(ErrorDiff),
    Structure(StructureDiff),
}

/// All diffs between a baseline and a target trace, partitioned by kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceDiff {
    pub latency_diffs: Vec<LatencyDiff>,
    pub error_diffs: Vec<ErrorDiff>,
    pub structure_diffs: Vec<StructureDiff>,
    /// Signed end-to-end movement: summed duration change of matched root
    /// spans, ignoring the noise floor. Context for the per-span diffs.
    pub root_latency_delta_ms: f64,
}

impl TraceDiff {
    fn from_records(records: Vec<SpanDiff>) -> Self {
        let mut diff = TraceDiff::default();
        for record in records {
            match record {
                SpanDiff::Latency(d) => diff.latency_diffs.push(d),
                SpanDiff::Error(d) => diff.error_diffs.push(d),
                SpanDiff::Structure(d) => diff.structure_diffs.push(d),
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.latency_diffs.is_empty()
            && self.error_diffs.is_empty()
            && self.structure_diffs.is_empty()
    }
}

/// Diff a baseline forest against a target forest
///
/// `noise_floor_ms` suppresses latency diffs with `|diff| <= floor`; sub-floor
/// jitter between captures is measurement noise, not a finding.
pub fn compare(baseline: &TraceForest, target: &TraceForest, noise_floor_ms: f64) -> TraceDiff {
    let pairs = match_spans(baseline, target);
    let matched_base: HashSet<usize> = pairs.iter().map(|&(b, _)| b).collect();
    let matched_target: HashSet<usize> = pairs.iter().map(|&(_, t)| t).collect();

    let mut records = Vec::new();

    for &(b, t) in &pairs {
        let base = baseline.span(b);
        let tgt = target.span(t);

        if baseline.is_temporally_valid(b) && target.is_temporally_valid(t) {
            let diff_ms = tgt.duration_ms() - base.duration_ms();
            if diff_ms.abs() > noise_floor_ms {
                let diff_percent = if base.duration_ms() > 0.0 {
                    (diff_ms / base.duration_ms()) * 100.0
                } else {
                    0.0
                };
                records.push(SpanDiff::Latency(LatencyDiff {
                    span_id: tgt.span_id.clone(),
                    span_name: tgt.name.clone(),
                    baseline_duration_ms: base.duration_ms(),
                    target_duration_ms: tgt.duration_ms(),
                    diff_ms,
                    diff_percent,
                }));
            }
        }

        if base.status != tgt.status {
            records.push(SpanDiff::Error(ErrorDiff {
                span_id: tgt.span_id.clone(),
                span_name: tgt.name.clone(),
                baseline_status: base.status,
                target_status: tgt.status,
            }));
        }
    }

    for b in 0..baseline.len() {
        if !matched_base.contains(&b) {
            let span = baseline.span(b);
            records.push(SpanDiff::Structure(StructureDiff {
                span_id: span.span_id.clone(),
                span_name: span.name.clone(),
                change: StructureChange::Removed,
            }));
        }
    }
    for t in 0..target.len() {
        if !matched_target.contains(&t) {
            let span = target.span(t);
            records.push(SpanDiff::Structure(StructureDiff {
                span_id: span.span_id.clone(),
                span_name: span.name.clone(),
                change: StructureChange::Added,
            }));
        }
    }

    let mut diff = TraceDiff::from_records(records);
    diff.root_latency_delta_ms = pairs
        .iter()
        .filter(|&&(b, t)| {
            baseline.parent(b).is_none()
                && baseline.is_temporally_valid(b)
                && target.is_temporally_valid(t)
        })
        .map(|&(b, t)| target.span(t).duration_ms() - baseline.span(b).duration_ms())
        .sum();
    diff
}

/// Match spans between the two forests: `(baseline_slot, target_slot)` pairs
fn match_spans(baseline: &TraceForest, target: &TraceForest) -> Vec<(usize, usize)> {
    let shares_ids = (0..baseline.len()).any(|b| target.slot(&baseline.span(b).span_id).is_some());

    if shares_ids {
        debug!("matching spans by shared span_id");
        (0..baseline.len())
            .filter_map(|b| {
                target
                    .slot(&baseline.span(b).span_id)
                    .map(|t| (b, t))
                    // Guard against duplicate IDs aliasing both sides to the
                    // same slot.
                    .filter(|&(b, _)| baseline.slot(&baseline.span(b).span_id) == Some(b))
            })
            .collect()
    } else {
        debug!("no shared span IDs; matching by name + ordinal occurrence");
        let base_by_name = occurrences_by_name(baseline);
        let target_by_name = occurrences_by_name(target);

        let mut pairs = Vec::new();
        for (name, base_slots) in &base_by_name {
            if let Some(target_slots) = target_by_name.get(name) {
                for (&b, &t) in base_slots.iter().zip(target_slots.iter()) {
                    pairs.push((b, t));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }
}

/// Per-name slot lists, ordered by start time
fn occurrences_by_name(forest: &TraceForest) -> HashMap<String, Vec<usize>> {
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
    let mut order: Vec<usize> = (0..forest.len()).collect();
    order.sort_by(|&a, &b| {
        forest
            .span(a)
            .start_time_ms
            .total_cmp(&forest.span(b).start_time_ms)
    });
    for slot in order {
        by_name
            .entry(forest.span(slot).name.clone())
            .or_default()
            .push(slot);
    }
    by_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span_record::{SpanRecord, Trace};

    fn forest(spans: Vec<SpanRecord>) -> TraceForest {
        TraceForest::from_trace(&Trace::new("t", spans)).unwrap()
    }

    fn span(id: &str, parent: Option<&str>, name: &str, start: f64, end: f64) -> SpanRecord {
        SpanRecord::new(id, parent, name, start, end)
    }

    #[test]
    fn test_identical_traces_produce_no_diffs() {
        let spans = vec![
            span("root", None, "handler", 0.0, 100.0),
            span("c", Some("root"), "db.query", 10.0, 50.0),
        ];
        let diff = compare(&forest(spans.clone()), &forest(spans), 1.0);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_latency_diff_by_span_id() {
        let base = forest(vec![
            span("root", None, "handler", 0.0, 100.0),
            span("c", Some("root"), "db.query", 10.0, 50.0),
        ]);
        let target = forest(vec![
            span("root", None, "handler", 0.0, 160.0),
            span("c", Some("root"), "db.query", 10.0, 110.0),
        ]);
        let diff = compare(&base, &target, 1.0);

        assert_eq!(diff.latency_diffs.len(), 2);
        let db = diff
            .latency_diffs
            .iter()
            .find(|d| d.span_name == "db.query")
            .unwrap();
        assert_eq!(db.diff_ms, 60.0);
        assert_eq!(db.diff_percent, 150.0);
        // Only the root's own movement counts toward the end-to-end delta.
        assert_eq!(diff.root_latency_delta_ms, 60.0);
    }

    #[test]
    fn test_noise_floor_suppresses_jitter() {
        let base = forest(vec![span("a", None, "work", 0.0, 100.0)]);
        let target = forest(vec![span("a", None, "work", 0.0, 100.8)]);
        let diff = compare(&base, &target, 1.0);
        assert!(diff.latency_diffs.is_empty());
    }

    #[test]
    fn test_error_diff_both_directions() {
        let base = forest(vec![
            span("a", None, "rpc.call", 0.0, 10.0),
            span("b", None, "db.query", 0.0, 10.0).with_status(SpanStatus::Error),
        ]);
        let target = forest(vec![
            span("a", None, "rpc.call", 0.0, 10.0).with_status(SpanStatus::Error),
            span("b", None, "db.query", 0.0, 10.0),
        ]);
        let diff = compare(&base, &target, 1.0);

        assert_eq!(diff.error_diffs.len(), 2);
        let regressed = diff.error_diffs.iter().find(|d| d.span_id == "a").unwrap();
        assert_eq!(regressed.baseline_status, SpanStatus::Ok);
        assert_eq!(regressed.target_status, SpanStatus::Error);
    }

    #[test]
    fn test_structure_diff() {
        let base = forest(vec![
            span("root", None, "handler", 0.0, 100.0),
            span("old", Some("root"), "cache.get", 10.0, 20.0),
        ]);
        let target = forest(vec![
            span("root", None, "handler", 0.0, 100.0),
            span("new", Some("root"), "db.query", 10.0, 20.0),
        ]);
        let diff = compare(&base, &target, 1.0);

        assert_eq!(diff.structure_diffs.len(), 2);
        let removed = diff
            .structure_diffs
            .iter()
            .find(|d| d.change == StructureChange::Removed)
            .unwrap();
        assert_eq!(removed.span_name, "cache.get");
        let added = diff
            .structure_diffs
            .iter()
            .find(|d| d.change == StructureChange::Added)
            .unwrap();
        assert_eq!(added.span_name, "db.query");
    }

    #[test]
    fn test_name_ordinal_matching_without_shared_ids() {
        // Different capture runs, fresh IDs: match by name + position.
        let base = forest(vec![
            span("b1", None, "handler", 0.0, 100.0),
            span("b2", Some("b1"), "db.query", 0.0, 30.0),
            span("b3", Some("b1"), "db.query", 30.0, 60.0),
        ]);
        let target = forest(vec![
            span("t1", None, "handler", 0.0, 200.0),
            span("t2", Some("t1"), "db.query", 0.0, 30.0),
            span("t3", Some("t1"), "db.query", 30.0, 160.0),
        ]);
        let diff = compare(&base, &target, 1.0);

        // handler +100, second db.query +100; first db.query unchanged.
        assert_eq!(diff.latency_diffs.len(), 2);
        let second_query = diff
            .latency_diffs
            .iter()
            .find(|d| d.span_id == "t3")
            .unwrap();
        assert_eq!(second_query.diff_ms, 100.0);
        assert!(diff.structure_diffs.is_empty());
    }

    #[test]
    fn test_unpaired_ordinal_becomes_structure_diff() {
        let base = forest(vec![span("b1", None, "db.query", 0.0, 30.0)]);
        let target = forest(vec![
            span("t1", None, "db.query", 0.0, 30.0),
            span("t2", None, "db.query", 30.0, 60.0),
        ]);
        let diff = compare(&base, &target, 1.0);

        assert_eq!(diff.structure_diffs.len(), 1);
        assert_eq!(diff.structure_diffs[0].change, StructureChange::Added);
        assert_eq!(diff.structure_diffs[0].span_id, "t2");
    }

    #[test]
    fn test_invalid_intervals_skip_latency_only() {
        let base = forest(vec![span("a", None, "work", 0.0, 100.0)]);
        let target = forest(vec![
            span("a", None, "work", 500.0, 100.0).with_status(SpanStatus::Error)
        ]);
        let diff = compare(&base, &target, 1.0);

        // Broken timestamps invalidate the latency comparison but not the
        // status comparison.
        assert!(diff.latency_diffs.is_empty());
        assert_eq!(diff.error_diffs.len(), 1);
    }
}
