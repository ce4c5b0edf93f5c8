//! Causal root-cause scoring
//!
//! Ranks latency regressions by how likely each one is the *origin* of a
//! slowdown rather than a symptom of it. A parent span that merely waits on a
//! slow child shows the same raw diff as the child; the score separates them
//! with three structural signals from the target trace:
//!
//! - depth: deeper spans are closer to the actual work
//! - critical-path membership: off-path regressions cannot move end-to-end
//!   latency
//! - self-time share: a span that got slower in its *own* work (not in waiting
//!   on children) is the origin
//!
//! `confidence_score = diff_ms * depth_factor * path_factor * self_time_factor`
//! where `depth_factor = min(1.0 + depth * 0.1, 1.5)`, `path_factor = 2.0` on
//! the critical path (else 1.0), and `self_time_factor = 1.3` when self time
//! exceeds 30% of the diff (else 1.0).

use crate::comparator::LatencyDiff;
use crate::critical_path::CriticalPathResult;
use crate::trace_forest::TraceForest;
use serde::{Deserialize, Serialize};

/// Tuning knobs for root-cause flagging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RootCauseConfig {
    /// Any candidate scoring above this is flagged, not just the top-ranked
    /// one. The unit is weighted milliseconds, so 500 roughly means "a 250 ms
    /// critical-path regression or worse".
    pub score_cutoff: f64,
}

impl Default for RootCauseConfig {
    fn default() -> Self {
        Self { score_cutoff: 500.0 }
    }
}

/// A latency regression scored for causal likelihood
#[derive(Debug, Clone, Serialize)]
pub struct RootCauseCandidate {
    pub span_id: String,
    pub span_name: String,
    /// Regression size (always positive; improvements are not candidates)
    pub diff_ms: f64,
    pub on_critical_path: bool,
    pub self_time_ms: f64,
    pub depth: usize,
    pub confidence_score: f64,
    /// True for the top-ranked candidate and any candidate above the cutoff
    pub is_likely_root_cause: bool,
}

/// Score and rank latency regressions against the target trace's structure
///
/// Only positive diffs (regressions) become candidates. Diffs whose span does
/// not appear in the target forest are skipped; that only happens when the
/// caller mixes diffs from a different comparison.
pub fn rank(
    latency_diffs: &[LatencyDiff],
    target: &TraceForest,
    critical: &CriticalPathResult,
    self_times: &[f64],
    config: &RootCauseConfig,
) -> Vec<RootCauseCandidate> {
    let mut candidates: Vec<RootCauseCandidate> = latency_diffs
        .iter()
        .filter(|d| d.diff_ms > 0.0)
        .filter_map(|d| {
            let slot = target.slot(&d.span_id)?;
            let depth = target.depth(slot);
            let on_path = critical.is_on_critical_path(slot);
            let self_time_ms = self_times.get(slot).copied().unwrap_or(0.0);

            let depth_factor = (1.0 + depth as f64 * 0.1).min(1.5);
            let path_factor = if on_path { 2.0 } else { 1.0 };
            let self_time_factor = if self_time_ms > 0.3 * d.diff_ms {
                1.3
            } else {
                1.0
            };

            Some(RootCauseCandidate {
                span_id: d.span_id.clone(),
                span_name: d.span_name.clone(),
                diff_ms: d.diff_ms,
                on_critical_path: on_path,
                self_time_ms,
                depth,
                confidence_score: d.diff_ms * depth_factor * path_factor * self_time_factor,
                is_likely_root_cause: false,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence_score
            .total_cmp(&a.confidence_score)
            .then(b.on_critical_path.cmp(&a.on_critical_path))
            .then(b.diff_ms.total_cmp(&a.diff_ms))
    });

    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.is_likely_root_cause =
            i == 0 || candidate.confidence_score > config.score_cutoff;
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator;
    use crate::critical_path;
    use crate::span_record::{SpanRecord, Trace};

    fn forest(spans: Vec<SpanRecord>) -> TraceForest {
        TraceForest::from_trace(&Trace::new("t", spans)).unwrap()
    }

    fn span(id: &str, parent: Option<&str>, name: &str, start: f64, end: f64) -> SpanRecord {
        SpanRecord::new(id, parent, name, start, end)
    }

    fn analyze(
        base: &TraceForest,
        target: &TraceForest,
        config: &RootCauseConfig,
    ) -> Vec<RootCauseCandidate> {
        let diff = comparator::compare(base, target, 1.0);
        let critical = critical_path::analyze(target);
        let self_times = critical_path::self_times(target);
        rank(&diff.latency_diffs, target, &critical, &self_times, config)
    }

    #[test]
    fn test_deep_self_time_regression_outranks_symptomatic_parent() {
        // Baseline: handler -> service -> db.query, 33 ms leaf.
        let base = forest(vec![
            span("h", None, "handler", 0.0, 100.0),
            span("s", Some("h"), "service.call", 10.0, 90.0),
            span("q", Some("s"), "db.query", 20.0, 53.0),
        ]);
        // Target: the leaf grew to 333 ms and dragged both ancestors with it.
        let target = forest(vec![
            span("h", None, "handler", 0.0, 400.0),
            span("s", Some("h"), "service.call", 10.0, 390.0),
            span("q", Some("s"), "db.query", 20.0, 353.0),
        ]);

        let candidates = analyze(&base, &target, &RootCauseConfig::default());
        assert_eq!(candidates.len(), 3);

        let top = &candidates[0];
        assert_eq!(top.span_name, "db.query");
        assert_eq!(top.depth, 2);
        assert!(top.on_critical_path);
        assert!(top.is_likely_root_cause);

        // The leaf's diff (300 ms) equals each ancestor's, but depth and
        // self-time growth separate it.
        assert!(top.confidence_score > candidates[1].confidence_score);
    }

    #[test]
    fn test_critical_path_doubles_score() {
        // Two concurrent children regress by the same amount; only the longer
        // one is on the critical path.
        let base = forest(vec![
            span("h", None, "handler", 0.0, 100.0),
            span("a", Some("h"), "fetch.a", 0.0, 100.0),
            span("b", Some("h"), "fetch.b", 0.0, 40.0),
        ]);
        let target = forest(vec![
            span("h", None, "handler", 0.0, 150.0),
            span("a", Some("h"), "fetch.a", 0.0, 150.0),
            span("b", Some("h"), "fetch.b", 0.0, 90.0),
        ]);

        let candidates = analyze(&base, &target, &RootCauseConfig::default());
        let on_path = candidates
            .iter()
            .find(|c| c.span_name == "fetch.a")
            .unwrap();
        let off_path = candidates
            .iter()
            .find(|c| c.span_name == "fetch.b")
            .unwrap();

        assert!(on_path.on_critical_path);
        assert!(!off_path.on_critical_path);
        assert_eq!(on_path.diff_ms, off_path.diff_ms);
        assert_eq!(on_path.confidence_score, 2.0 * off_path.confidence_score);
    }

    #[test]
    fn test_improvements_are_not_candidates() {
        let base = forest(vec![span("a", None, "work", 0.0, 200.0)]);
        let target = forest(vec![span("a", None, "work", 0.0, 50.0)]);
        let candidates = analyze(&base, &target, &RootCauseConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_top_candidate_always_flagged_even_below_cutoff() {
        let base = forest(vec![span("a", None, "work", 0.0, 100.0)]);
        let target = forest(vec![span("a", None, "work", 0.0, 110.0)]);
        let candidates = analyze(&base, &target, &RootCauseConfig::default());

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].confidence_score < 500.0);
        assert!(candidates[0].is_likely_root_cause);
    }

    #[test]
    fn test_cutoff_flags_multiple_candidates() {
        let base = forest(vec![
            span("h", None, "handler", 0.0, 100.0),
            span("a", Some("h"), "fetch.a", 0.0, 50.0),
            span("b", Some("h"), "fetch.b", 50.0, 100.0),
        ]);
        let target = forest(vec![
            span("h", None, "handler", 0.0, 900.0),
            span("a", Some("h"), "fetch.a", 0.0, 450.0),
            span("b", Some("h"), "fetch.b", 450.0, 900.0),
        ]);

        let config = RootCauseConfig { score_cutoff: 500.0 };
        let candidates = analyze(&base, &target, &config);
        let flagged = candidates.iter().filter(|c| c.is_likely_root_cause).count();
        assert!(flagged >= 2, "both 400 ms serial regressions score > 500");
    }

    #[test]
    fn test_depth_factor_caps_at_one_point_five() {
        let mut base_spans = vec![span("s0", None, "level0", 0.0, 100.0)];
        let mut target_spans = vec![span("s0", None, "level0", 0.0, 300.0)];
        for i in 1..8 {
            let parent = format!("s{}", i - 1);
            base_spans.push(span(
                &format!("s{i}"),
                Some(&parent),
                &format!("level{i}"),
                0.0,
                100.0 - i as f64,
            ));
            target_spans.push(span(
                &format!("s{i}"),
                Some(&parent),
                &format!("level{i}"),
                0.0,
                300.0 - i as f64,
            ));
        }
        let candidates = analyze(
            &forest(base_spans),
            &forest(target_spans),
            &RootCauseConfig::default(),
        );

        let deepest = candidates.iter().find(|c| c.depth == 7).unwrap();
        let factor = deepest.confidence_score / deepest.diff_ms;
        // path_factor 2.0 * capped depth_factor 1.5; self-time factor does not
        // apply to a pure wait.
        assert!(factor <= 2.0 * 1.5 * 1.3 + 1e-9);
    }
}
