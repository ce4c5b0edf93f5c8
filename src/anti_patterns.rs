//! Anti-pattern detection for distributed traces
//!
//! Two execution anti-patterns are detected on the normalized forest:
//!
//! ## 1. N+1 Query
//! Repeated identical sibling operations under one parent (e.g., `db.query`
//! issued once per row), indicating a missing batching optimization.
//! - **Detection:** >= 3 same-name siblings, combined duration > 50 ms
//! - **Impact:** high above 200 ms combined, medium otherwise
//!
//! ## 2. Serial Chain
//! Independent operations executed back-to-back that could run concurrently.
//! - **Detection:** >= 3 spans in start order with < 10 ms gaps between one
//!   span's end and the next span's start, combined duration > 100 ms.
//!   Parent-child pairs are expected nesting and never chain; runs that are
//!   just an N+1 group (same name, same parent) are left to the N+1 detector.
//! - **Impact:** high above 500 ms combined, medium otherwise
//!
//! All thresholds are configuration, not constants ([`AntiPatternThresholds`]).

use crate::trace_forest::TraceForest;
use serde::{Deserialize, Serialize};

/// Impact level for a detected anti-pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Noticeable cost, below the high-impact budget
    Medium,
    /// Significant bottleneck
    High,
}

/// Configurable thresholds for anti-pattern detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiPatternThresholds {
    /// Minimum same-name sibling group size for N+1
    pub n_plus_one_min_count: usize,
    /// Minimum combined duration for an N+1 finding (ms)
    pub n_plus_one_min_total_ms: f64,
    /// Combined duration above which an N+1 finding is high impact (ms)
    pub n_plus_one_high_ms: f64,
    /// Minimum run length for a serial chain
    pub serial_chain_min_len: usize,
    /// Maximum end-to-start gap that still chains two spans (ms)
    pub serial_chain_max_gap_ms: f64,
    /// Minimum combined duration for a serial-chain finding (ms)
    pub serial_chain_min_total_ms: f64,
    /// Combined duration above which a serial chain is high impact (ms)
    pub serial_chain_high_ms: f64,
}

impl Default for AntiPatternThresholds {
    fn default() -> Self {
        Self {
            n_plus_one_min_count: 3,
            n_plus_one_min_total_ms: 50.0,
            n_plus_one_high_ms: 200.0,
            serial_chain_min_len: 3,
            serial_chain_max_gap_ms: 10.0,
            serial_chain_min_total_ms: 100.0,
            serial_chain_high_ms: 500.0,
        }
    }
}

/// Detected anti-pattern finding
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum AntiPatternFinding {
    /// Repeated identical sibling operations
    NPlusOne {
        span_names: Vec<String>,
        count: usize,
        total_duration_ms: f64,
        impact: Impact,
        recommendation: String,
    },

    /// Back-to-back independent operations
    SerialChain {
        span_names: Vec<String>,
        count: usize,
        total_duration_ms: f64,
        impact: Impact,
        recommendation: String,
    },
}

impl AntiPatternFinding {
    pub fn impact(&self) -> Impact {
        match self {
            AntiPatternFinding::NPlusOne { impact, .. } => *impact,
            AntiPatternFinding::SerialChain { impact, .. } => *impact,
        }
    }

    pub fn total_duration_ms(&self) -> f64 {
        match self {
            AntiPatternFinding::NPlusOne {
                total_duration_ms, ..
            } => *total_duration_ms,
            AntiPatternFinding::SerialChain {
                total_duration_ms, ..
            } => *total_duration_ms,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        match self {
            AntiPatternFinding::NPlusOne {
                span_names,
                count,
                total_duration_ms,
                ..
            } => format!(
                "'{}' executed {} times under one parent ({:.0}ms combined). \
                 Likely an N+1 access pattern.",
                span_names.first().map(String::as_str).unwrap_or("?"),
                count,
                total_duration_ms
            ),
            AntiPatternFinding::SerialChain {
                count,
                total_duration_ms,
                ..
            } => format!(
                "{} operations executed back-to-back ({:.0}ms combined) with \
                 no overlap.",
                count, total_duration_ms
            ),
        }
    }
}

/// Detects anti-patterns in a normalized trace
#[derive(Debug, Default)]
pub struct AntiPatternDetector {
    thresholds: AntiPatternThresholds,
}

impl AntiPatternDetector {
    pub fn new(thresholds: AntiPatternThresholds) -> Self {
        Self { thresholds }
    }

    /// Detect all anti-patterns, highest impact first
    pub fn analyze(&self, forest: &TraceForest) -> Vec<AntiPatternFinding> {
        let mut findings = self.detect_n_plus_one(forest);
        findings.extend(self.detect_serial_chains(forest));

        findings.sort_by(|a, b| {
            b.impact()
                .cmp(&a.impact())
                .then(b.total_duration_ms().total_cmp(&a.total_duration_ms()))
        });
        findings
    }

    /// Group same-name siblings under each parent (roots count as siblings
    /// of a virtual parent). Spans with broken timestamps still count toward
    /// group size; they just contribute 0 duration.
    fn detect_n_plus_one(&self, forest: &TraceForest) -> Vec<AntiPatternFinding> {
        let t = &self.thresholds;
        let mut findings = Vec::new();

        let mut sibling_sets: Vec<Vec<usize>> = vec![forest.roots().to_vec()];
        sibling_sets.extend((0..forest.len()).map(|i| forest.children(i).to_vec()));

        for siblings in sibling_sets {
            let mut by_name: std::collections::HashMap<&str, (usize, f64)> =
                std::collections::HashMap::new();
            for &slot in &siblings {
                let span = forest.span(slot);
                let entry = by_name.entry(span.name.as_str()).or_insert((0, 0.0));
                entry.0 += 1;
                if forest.is_temporally_valid(slot) {
                    entry.1 += span.duration_ms();
                }
            }

            for (name, (count, total_ms)) in by_name {
                if count >= t.n_plus_one_min_count && total_ms > t.n_plus_one_min_total_ms {
                    let impact = if total_ms > t.n_plus_one_high_ms {
                        Impact::High
                    } else {
                        Impact::Medium
                    };
                    findings.push(AntiPatternFinding::NPlusOne {
                        span_names: vec![name.to_string()],
                        count,
                        total_duration_ms: total_ms,
                        impact,
                        recommendation: format!(
                            "Batch the {count} '{name}' calls into a single operation, \
                             or cache the repeated result."
                        ),
                    });
                }
            }
        }

        findings
    }

    /// Scan spans in start order for back-to-back runs
    fn detect_serial_chains(&self, forest: &TraceForest) -> Vec<AntiPatternFinding> {
        let t = &self.thresholds;

        let mut order: Vec<usize> = (0..forest.len())
            .filter(|&i| forest.is_temporally_valid(i))
            .collect();
        order.sort_by(|&a, &b| {
            forest
                .span(a)
                .start_time_ms
                .total_cmp(&forest.span(b).start_time_ms)
        });

        let related = |a: usize, b: usize| forest.parent(a) == Some(b) || forest.parent(b) == Some(a);

        let mut findings = Vec::new();
        let mut run: Vec<usize> = Vec::new();
        for &slot in &order {
            let chains = run.last().is_some_and(|&prev| {
                let gap = forest.span(slot).start_time_ms - forest.span(prev).end_time_ms;
                (0.0..t.serial_chain_max_gap_ms).contains(&gap) && !related(prev, slot)
            });
            if !chains {
                self.flush_serial_run(forest, &run, &mut findings);
                run.clear();
            }
            run.push(slot);
        }
        self.flush_serial_run(forest, &run, &mut findings);

        findings
    }

    fn flush_serial_run(
        &self,
        forest: &TraceForest,
        run: &[usize],
        findings: &mut Vec<AntiPatternFinding>,
    ) {
        let t = &self.thresholds;
        if run.len() < t.serial_chain_min_len {
            return;
        }

        // A run that is one repeated operation under one parent is the N+1
        // detector's finding, not a parallelization opportunity.
        let first = forest.span(run[0]);
        let uniform = run.iter().all(|&s| {
            forest.span(s).name == first.name && forest.parent(s) == forest.parent(run[0])
        });
        if uniform {
            return;
        }

        let total_ms: f64 = run.iter().map(|&s| forest.span(s).duration_ms()).sum();
        if total_ms <= t.serial_chain_min_total_ms {
            return;
        }

        let impact = if total_ms > t.serial_chain_high_ms {
            Impact::High
        } else {
            Impact::Medium
        };
        findings.push(AntiPatternFinding::SerialChain {
            span_names: run.iter().map(|&s| forest.span(s).name.clone()).collect(),
            count: run.len(),
            total_duration_ms: total_ms,
            impact,
            recommendation: "These operations do not overlap and are not nested; \
                             consider executing them concurrently."
                .to_string(),
        });
    }
}
