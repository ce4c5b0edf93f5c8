//! Critical path analysis for distributed traces
//!
//! This module computes per-span **self-time** and reconstructs the **longest
//! blocking execution chain** through a concurrent span forest.
//!
//! # Self-time
//!
//! Self-time is the span's duration minus the time covered by its direct
//! children. Children may overlap (concurrent fan-out), so their intervals are
//! first merged into a minimal non-overlapping set (sort by start, merge when
//! `next.start <= current.end`) before subtraction. Self-time is clamped to
//! >= 0 even for pathological fully-overlapping children.
//!
//! # Blocking chain
//!
//! At each span, children the parent actually waited on form a **blocking
//! sequence**. Overlapping siblings cannot both have blocked the parent, so
//! the sequence is chosen by dynamic programming: weighted interval scheduling
//! over the sibling intervals, where each sibling's weight is its subtree's
//! chain weight (own self-time plus its best blocking sequence, computed
//! bottom-up). Concurrent siblings left out of the sequence contribute 0 to
//! the chain, which models non-blocking fan-out correctly.
//!
//! A single sibling is always a feasible sequence, so the chain weight at any
//! ancestor dominates every descendant's self-time; the reported duration is
//! therefore never below the largest single self-time in the trace.
//!
//! Tie-break: equal-weight alternatives resolve toward the earlier-ending,
//! earlier-starting, lower-slot sibling, so results are deterministic.
//!
//! # Derived metrics
//!
//! - `critical_path_duration` = sum of self-time along the chain
//! - `parallelism_ratio` = total self-time of all spans / critical path
//!   duration, always >= 1.0; equals 1.0 iff the trace is fully serial
//! - `parallelism_pct` = `(1 - critical_path/total_duration) * 100`

use crate::trace_forest::TraceForest;
use serde::Serialize;
use std::collections::HashSet;

/// One span on the critical path
#[derive(Debug, Clone, Serialize)]
pub struct CriticalPathNode {
    pub span_id: String,
    pub name: String,
    pub self_time_ms: f64,
    pub duration_ms: f64,
    /// Self-time as a percentage of trace total duration
    pub contribution_pct: f64,
    /// Self-time as a percentage of the critical path duration
    pub blocking_contribution_pct: f64,
}

/// Result of critical path analysis
///
/// Computed fresh per analysis call; nothing here is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CriticalPathResult {
    /// Chain nodes in blocking execution order (root first)
    pub nodes: Vec<CriticalPathNode>,
    /// Sum of self-time along the chain (milliseconds)
    pub critical_path_duration_ms: f64,
    /// Trace total duration (max end - min start over roots)
    pub total_duration_ms: f64,
    /// Total work / critical path duration; >= 1.0
    pub parallelism_ratio: f64,
    /// `(1 - critical_path/total_duration) * 100`, clamped to [0, 100]
    pub parallelism_pct: f64,
    #[serde(skip)]
    path_slots: HashSet<usize>,
}

impl CriticalPathResult {
    /// Check whether an arena slot lies on the critical path
    pub fn is_on_critical_path(&self, slot: usize) -> bool {
        self.path_slots.contains(&slot)
    }

    /// The chain node with the largest self-time (biggest bottleneck)
    pub fn longest_node(&self) -> Option<&CriticalPathNode> {
        self.nodes
            .iter()
            .max_by(|a, b| a.self_time_ms.total_cmp(&b.self_time_ms))
    }
}

/// Compute self-time for every span in the forest
///
/// Slots with unusable intervals get 0. Clock-skewed children are excluded
/// from the subtraction (they invalidate only this calculation); remaining
/// child intervals are clamped to the parent's bounds before merging.
pub fn self_times(forest: &TraceForest) -> Vec<f64> {
    let mut out = vec![0.0; forest.len()];

    for idx in 0..forest.len() {
        if !forest.is_temporally_valid(idx) {
            continue;
        }
        let span = forest.span(idx);

        let mut intervals: Vec<(f64, f64)> = forest
            .children(idx)
            .iter()
            .copied()
            .filter(|&c| forest.is_temporally_valid(c) && !forest.is_clock_skewed(c))
            .filter_map(|c| {
                let child = forest.span(c);
                let start = child.start_time_ms.max(span.start_time_ms);
                let end = child.end_time_ms.min(span.end_time_ms);
                (end > start).then_some((start, end))
            })
            .collect();

        let covered = merge_and_measure(&mut intervals);
        out[idx] = (span.duration_ms() - covered).max(0.0);
    }

    out
}

/// Merge intervals in place and return the total covered length
fn merge_and_measure(intervals: &mut Vec<(f64, f64)>) -> f64 {
    if intervals.is_empty() {
        return 0.0;
    }
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut covered = 0.0;
    let (mut cur_start, mut cur_end) = intervals[0];
    for &(start, end) in intervals.iter().skip(1) {
        if start <= cur_end {
            cur_end = cur_end.max(end);
        } else {
            covered += cur_end - cur_start;
            cur_start = start;
            cur_end = end;
        }
    }
    covered += cur_end - cur_start;
    covered
}

/// Analyze the forest and reconstruct the critical path
pub fn analyze(forest: &TraceForest) -> CriticalPathResult {
    let self_time = self_times(forest);
    let total_duration = forest.total_duration_ms();
    let n = forest.len();

    // Bottom-up chain weights: children carry greater depth, so processing by
    // descending depth sees every child before its parent.
    let mut weight = vec![0.0f64; n];
    let mut selected: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut by_depth: Vec<usize> = (0..n).collect();
    by_depth.sort_by(|&a, &b| forest.depth(b).cmp(&forest.depth(a)));
    for &slot in &by_depth {
        if !forest.is_temporally_valid(slot) {
            continue;
        }
        let (child_weight, picked) = blocking_sequence(forest, forest.children(slot), &weight);
        weight[slot] = self_time[slot] + child_weight;
        selected[slot] = picked;
    }
    let (_, root_seq) = blocking_sequence(forest, forest.roots(), &weight);

    // Preorder walk over the selected structure; visited guard protects
    // against duplicate IDs aliasing to the same slot.
    let mut path: Vec<usize> = Vec::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut stack: Vec<usize> = root_seq.iter().rev().copied().collect();
    while let Some(slot) = stack.pop() {
        if !visited.insert(slot) {
            continue;
        }
        path.push(slot);
        for &child in selected[slot].iter().rev() {
            stack.push(child);
        }
    }

    let critical_duration: f64 = path.iter().map(|&i| self_time[i]).sum();
    let total_work: f64 = (0..forest.len())
        .filter(|&i| forest.is_temporally_valid(i))
        .map(|i| self_time[i])
        .sum();

    let parallelism_ratio = if critical_duration > 0.0 {
        (total_work / critical_duration).max(1.0)
    } else {
        1.0
    };
    let parallelism_pct = if total_duration > 0.0 {
        ((1.0 - critical_duration / total_duration) * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let nodes = path
        .iter()
        .map(|&slot| {
            let span = forest.span(slot);
            CriticalPathNode {
                span_id: span.span_id.clone(),
                name: span.name.clone(),
                self_time_ms: self_time[slot],
                duration_ms: span.duration_ms(),
                contribution_pct: pct(self_time[slot], total_duration),
                blocking_contribution_pct: pct(self_time[slot], critical_duration),
            }
        })
        .collect();

    CriticalPathResult {
        nodes,
        critical_path_duration_ms: critical_duration,
        total_duration_ms: total_duration,
        parallelism_ratio,
        parallelism_pct,
        path_slots: path.into_iter().collect(),
    }
}

fn pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole) * 100.0
    } else {
        0.0
    }
}

/// Select the blocking sequence among sibling candidates
///
/// Weighted interval scheduling over the usable siblings: maximize the summed
/// chain weight of a set of pairwise non-overlapping intervals. Returns the
/// best total and the chosen slots in start order. Quadratic in the sibling
/// count, which stays small in practice (fan-out per span, not trace size).
fn blocking_sequence(
    forest: &TraceForest,
    candidates: &[usize],
    weight: &[f64],
) -> (f64, Vec<usize>) {
    let mut usable: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&c| {
            forest.is_temporally_valid(c) && !forest.is_clock_skewed(c) && weight[c] > 0.0
        })
        .collect();
    if usable.is_empty() {
        return (0.0, Vec::new());
    }
    usable.sort_by(|&a, &b| {
        let (sa, sb) = (forest.span(a), forest.span(b));
        sa.end_time_ms
            .total_cmp(&sb.end_time_ms)
            .then(sa.start_time_ms.total_cmp(&sb.start_time_ms))
            .then(a.cmp(&b))
    });

    // dp[i]: best sum over sequences ending at usable[i]; strict improvement
    // only, so equal-weight ties keep the earliest candidate.
    let m = usable.len();
    let mut dp = vec![0.0f64; m];
    let mut prev: Vec<Option<usize>> = vec![None; m];
    for i in 0..m {
        dp[i] = weight[usable[i]];
        let start_i = forest.span(usable[i]).start_time_ms;
        for j in 0..i {
            if forest.span(usable[j]).end_time_ms <= start_i && dp[j] + weight[usable[i]] > dp[i] {
                dp[i] = dp[j] + weight[usable[i]];
                prev[i] = Some(j);
            }
        }
    }

    let mut best = 0;
    for i in 1..m {
        if dp[i] > dp[best] {
            best = i;
        }
    }

    let mut seq = Vec::new();
    let mut cur = Some(best);
    while let Some(i) = cur {
        seq.push(usable[i]);
        cur = prev[i];
    }
    seq.reverse();
    (dp[best], seq)
}
