//! Trace normalizer: validated span forest construction
//!
//! Builds an arena-backed forest (flat span array + span_id index map + child
//! adjacency lists) from a flat record list. Object pointers are never used,
//! so malformed or cyclic parent references cannot create ownership cycles;
//! cycle members are simply unreachable from any root and are skipped by the
//! visited-set guard during traversal.
//!
//! Validation is non-fatal by design: orphans, negative durations and clock
//! skew are collected into a [`DataQualityReport`] while the valid portion of
//! the trace proceeds to analysis. The only fatal condition is an empty record
//! list ([`AnalysisError::EmptyTrace`]).

use crate::error::{AnalysisError, Result};
use crate::span_record::{SpanRecord, Trace};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Kind of a non-fatal data-quality defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// `parent_span_id` does not resolve to any span in the set
    OrphanedSpan,
    /// `end_time < start_time`
    NegativeDuration,
    /// Child interval extends outside its parent's interval
    ClockSkew,
    /// Another span already claimed this `span_id`
    DuplicateSpanId,
}

/// A single data-quality defect, attributed to the offending span
#[derive(Debug, Clone, Serialize)]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub span_id: String,
}

/// Data-quality report for one normalized trace
#[derive(Debug, Clone, Serialize)]
pub struct DataQualityReport {
    pub valid: bool,
    pub issue_count: usize,
    pub issues: Vec<QualityIssue>,
}

/// Arena-backed span forest with child adjacency
///
/// Spans live in a flat `Vec`; all relationships are arena indices. Spans with
/// unrecoverable timestamps stay in the arena (count-based findings still see
/// them) but are excluded from temporal calculations via
/// [`is_temporally_valid`](Self::is_temporally_valid).
///
/// # Example
///
/// ```
/// use indagar::span_record::{SpanRecord, Trace};
/// use indagar::trace_forest::TraceForest;
///
/// let trace = Trace::new(
///     "t1",
///     vec![
///         SpanRecord::new("root", None, "handler", 0.0, 100.0),
///         SpanRecord::new("c1", Some("root"), "db.query", 10.0, 60.0),
///     ],
/// );
/// let forest = TraceForest::from_trace(&trace)?;
/// assert_eq!(forest.roots(), &[0]);
/// assert_eq!(forest.children(0), &[1]);
/// assert_eq!(forest.total_duration_ms(), 100.0);
/// # Ok::<(), indagar::error::AnalysisError>(())
/// ```
#[derive(Debug)]
pub struct TraceForest {
    trace_id: String,
    /// Arena: spans in input order
    spans: Vec<SpanRecord>,
    /// span_id -> arena slot (first occurrence wins on duplicates)
    index: HashMap<String, usize>,
    /// Child adjacency, parallel to `spans`
    children: Vec<Vec<usize>>,
    /// Resolved parent slot, parallel to `spans`
    parent: Vec<Option<usize>>,
    /// Roots: no parent reference, or parent absent from the set
    roots: Vec<usize>,
    /// Depth from root (0-based); cycle members unreachable from a root get 0
    depth: Vec<usize>,
    /// Interval usable for temporal math (`end >= start`, finite)
    temporal_valid: Vec<bool>,
    /// Interval extends outside the parent's interval
    clock_skewed: Vec<bool>,
    issues: Vec<QualityIssue>,
}

impl TraceForest {
    /// Normalize a trace into a validated forest
    ///
    /// # Errors
    ///
    /// [`AnalysisError::EmptyTrace`] if the record list is empty. Every other
    /// defect is non-fatal and lands in [`quality_report`](Self::quality_report).
    pub fn from_trace(trace: &Trace) -> Result<Self> {
        if trace.spans.is_empty() {
            return Err(AnalysisError::EmptyTrace {
                trace_id: trace.trace_id.clone(),
            });
        }

        let spans: Vec<SpanRecord> = trace.spans.clone();
        let n = spans.len();
        let mut issues = Vec::new();

        // Phase 1: span_id index. First occurrence wins; duplicates are
        // reported and stay in the arena as unaddressable extra spans.
        let mut index: HashMap<String, usize> = HashMap::with_capacity(n);
        for (idx, span) in spans.iter().enumerate() {
            if index.contains_key(&span.span_id) {
                issues.push(QualityIssue {
                    kind: IssueKind::DuplicateSpanId,
                    span_id: span.span_id.clone(),
                });
            } else {
                index.insert(span.span_id.clone(), idx);
            }
        }

        // Phase 2: interval validation
        let mut temporal_valid = vec![true; n];
        for (idx, span) in spans.iter().enumerate() {
            if !span.has_valid_interval() {
                temporal_valid[idx] = false;
                issues.push(QualityIssue {
                    kind: IssueKind::NegativeDuration,
                    span_id: span.span_id.clone(),
                });
            }
        }

        // Phase 3: parent resolution. A self-reference or missing parent
        // makes the span an orphan root.
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut roots = Vec::new();
        for (idx, span) in spans.iter().enumerate() {
            match &span.parent_span_id {
                None => roots.push(idx),
                Some(pid) => match index.get(pid) {
                    Some(&p) if p != idx => {
                        parent[idx] = Some(p);
                        children[p].push(idx);
                    }
                    _ => {
                        issues.push(QualityIssue {
                            kind: IssueKind::OrphanedSpan,
                            span_id: span.span_id.clone(),
                        });
                        roots.push(idx);
                    }
                },
            }
        }

        // Phase 4: clock-skew detection. Only meaningful when both intervals
        // are individually valid.
        let mut clock_skewed = vec![false; n];
        for idx in 0..n {
            if let Some(p) = parent[idx] {
                if temporal_valid[idx]
                    && temporal_valid[p]
                    && (spans[idx].start_time_ms < spans[p].start_time_ms
                        || spans[idx].end_time_ms > spans[p].end_time_ms)
                {
                    clock_skewed[idx] = true;
                    issues.push(QualityIssue {
                        kind: IssueKind::ClockSkew,
                        span_id: spans[idx].span_id.clone(),
                    });
                }
            }
        }

        // Phase 5: depth assignment via iterative DFS with a visited guard.
        // Parent-ID cycles leave their members unreached; they keep depth 0
        // and are invisible to root-based traversals.
        let mut depth = vec![0usize; n];
        let mut visited = vec![false; n];
        let mut stack: Vec<(usize, usize)> = roots.iter().map(|&r| (r, 0)).collect();
        while let Some((node, d)) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            depth[node] = d;
            for &child in &children[node] {
                if !visited[child] {
                    stack.push((child, d + 1));
                }
            }
        }

        for issue in &issues {
            warn!(
                trace_id = %trace.trace_id,
                span_id = %issue.span_id,
                kind = ?issue.kind,
                "data-quality defect in trace"
            );
        }

        Ok(Self {
            trace_id: trace.trace_id.clone(),
            spans,
            index,
            children,
            parent,
            roots,
            depth,
            temporal_valid,
            clock_skewed,
            issues,
        })
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Span at an arena slot
    pub fn span(&self, idx: usize) -> &SpanRecord {
        &self.spans[idx]
    }

    /// All spans in arena order
    pub fn spans(&self) -> &[SpanRecord] {
        &self.spans
    }

    /// Arena slot for a span ID (first occurrence for duplicates)
    pub fn slot(&self, span_id: &str) -> Option<usize> {
        self.index.get(span_id).copied()
    }

    /// Child slots of a span
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Resolved parent slot of a span
    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parent[idx]
    }

    /// Root slots (no parent, or parent absent)
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Depth from root; roots are 0
    pub fn depth(&self, idx: usize) -> usize {
        self.depth[idx]
    }

    /// Interval usable for temporal calculations
    pub fn is_temporally_valid(&self, idx: usize) -> bool {
        self.temporal_valid[idx]
    }

    /// Interval extends outside its parent's interval. Skewed spans still
    /// count toward count-based findings but not toward self-time.
    pub fn is_clock_skewed(&self, idx: usize) -> bool {
        self.clock_skewed[idx]
    }

    /// Trace total duration: `max(end) - min(start)` over roots with usable
    /// intervals. Falls back to all temporally valid spans when no root
    /// qualifies.
    pub fn total_duration_ms(&self) -> f64 {
        let span_bounds = |slots: &mut dyn Iterator<Item = usize>| -> Option<(f64, f64)> {
            let mut bounds: Option<(f64, f64)> = None;
            for idx in slots {
                let s = &self.spans[idx];
                bounds = Some(match bounds {
                    None => (s.start_time_ms, s.end_time_ms),
                    Some((lo, hi)) => (lo.min(s.start_time_ms), hi.max(s.end_time_ms)),
                });
            }
            bounds
        };

        let mut valid_roots = self
            .roots
            .iter()
            .copied()
            .filter(|&r| self.temporal_valid[r]);
        let bounds = span_bounds(&mut valid_roots).or_else(|| {
            let mut all_valid = (0..self.spans.len()).filter(|&i| self.temporal_valid[i]);
            span_bounds(&mut all_valid)
        });

        bounds.map(|(lo, hi)| (hi - lo).max(0.0)).unwrap_or(0.0)
    }

    /// Build the data-quality report for this trace
    pub fn quality_report(&self) -> DataQualityReport {
        DataQualityReport {
            valid: self.issues.is_empty(),
            issue_count: self.issues.len(),
            issues: self.issues.clone(),
        }
    }
}
