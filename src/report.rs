//! Comparison orchestration and report assembly
//!
//! Runs the full pipeline for a baseline/target trace pair: normalize both
//! into forests, diff them, analyze the target's critical path and
//! anti-patterns, score root-cause candidates, and (when log windows are
//! supplied) compare log patterns. The assembled [`ComparisonReport`]
//! serializes to JSON for downstream tooling.

use crate::anti_patterns::{AntiPatternDetector, AntiPatternFinding};
use crate::cache::TtlCache;
use crate::comparator::{self, TraceDiff};
use crate::config::AnalysisConfig;
use crate::critical_path::{self, CriticalPathResult};
use crate::error::Result;
use crate::log_patterns::{self, LogRecord, LogReport};
use crate::root_cause::{self, RootCauseCandidate};
use crate::span_record::Trace;
use crate::trace_forest::{DataQualityReport, TraceForest};
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Full analysis of one baseline/target pair
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub baseline_trace_id: String,
    pub target_trace_id: String,
    pub baseline_quality: DataQualityReport,
    pub target_quality: DataQualityReport,
    pub diff: TraceDiff,
    /// Critical path of the target trace
    pub critical_path: CriticalPathResult,
    /// Anti-patterns detected in the target trace
    pub anti_patterns: Vec<AntiPatternFinding>,
    /// Latency regressions ranked by causal likelihood
    pub root_cause_candidates: Vec<RootCauseCandidate>,
    /// Present only when log windows were supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_report: Option<LogReport>,
    /// Analyses that could not run for this pair, by name
    pub skipped_analyses: Vec<String>,
}

impl ComparisonReport {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("Failed to serialize comparison report")
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize comparison report")
    }

    /// Whether any analyzer found something worth looking at
    pub fn has_findings(&self) -> bool {
        !self.diff.is_empty()
            || !self.anti_patterns.is_empty()
            || self.log_report.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// Compare two traces with no log windows
pub fn compare_traces(
    baseline: &Trace,
    target: &Trace,
    config: &AnalysisConfig,
) -> Result<ComparisonReport> {
    compare_traces_with_logs(baseline, target, None, config)
}

/// Compare two traces, optionally with matching log windows
///
/// `logs` is `(baseline_window, target_window)`; when `None`, the log pattern
/// analysis is recorded in `skipped_analyses`.
pub fn compare_traces_with_logs(
    baseline: &Trace,
    target: &Trace,
    logs: Option<(&[LogRecord], &[LogRecord])>,
    config: &AnalysisConfig,
) -> Result<ComparisonReport> {
    let baseline_forest = TraceForest::from_trace(baseline)?;
    let target_forest = TraceForest::from_trace(target)?;

    info!(
        baseline = %baseline_forest.trace_id(),
        target = %target_forest.trace_id(),
        "comparing traces"
    );

    let diff = comparator::compare(
        &baseline_forest,
        &target_forest,
        config.latency_noise_floor_ms,
    );
    let critical = critical_path::analyze(&target_forest);
    let self_times = critical_path::self_times(&target_forest);
    let anti_patterns =
        AntiPatternDetector::new(config.anti_patterns.clone()).analyze(&target_forest);
    let root_cause_candidates = root_cause::rank(
        &diff.latency_diffs,
        &target_forest,
        &critical,
        &self_times,
        &config.root_cause,
    );

    let mut skipped_analyses = Vec::new();
    let log_report = match logs {
        Some((base_logs, target_logs)) => Some(log_patterns::compare_windows(
            base_logs,
            target_logs,
            &config.log_clusters,
        )),
        None => {
            skipped_analyses.push("log_patterns".to_string());
            None
        }
    };

    debug!(
        latency_diffs = diff.latency_diffs.len(),
        anti_patterns = anti_patterns.len(),
        candidates = root_cause_candidates.len(),
        "analysis complete"
    );

    Ok(ComparisonReport {
        baseline_trace_id: baseline_forest.trace_id().to_string(),
        target_trace_id: target_forest.trace_id().to_string(),
        baseline_quality: baseline_forest.quality_report(),
        target_quality: target_forest.quality_report(),
        diff,
        critical_path: critical,
        anti_patterns,
        root_cause_candidates,
        log_report,
        skipped_analyses,
    })
}

/// Compare many pairs concurrently, one worker per pair
///
/// Results come back in input order; a failed pair does not abort the batch.
pub fn compare_batch(
    pairs: &[(Trace, Trace)],
    config: &AnalysisConfig,
) -> Vec<Result<ComparisonReport>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = pairs
            .iter()
            .map(|(baseline, target)| {
                scope.spawn(move || compare_traces(baseline, target, config))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

/// Cache-backed comparison front end
///
/// Keyed by `(baseline_trace_id, target_trace_id)`; a hit skips the whole
/// pipeline. Intended for triage tooling that re-requests the same pair
/// repeatedly while an incident is open.
pub struct ComparisonService {
    config: AnalysisConfig,
    cache: TtlCache<(String, String), ComparisonReport>,
    ttl: Duration,
}

impl ComparisonService {
    pub fn new(config: AnalysisConfig, cache_capacity: usize, ttl: Duration) -> Self {
        Self {
            config,
            cache: TtlCache::new(cache_capacity),
            ttl,
        }
    }

    pub fn compare(&self, baseline: &Trace, target: &Trace) -> Result<ComparisonReport> {
        let key = (baseline.trace_id.clone(), target.trace_id.clone());
        if let Some(report) = self.cache.get(&key) {
            debug!(baseline = %key.0, target = %key.1, "cache hit");
            return Ok(report);
        }
        let report = compare_traces(baseline, target, &self.config)?;
        self.cache.put(key, report.clone(), self.ttl);
        Ok(report)
    }
}
