//! Baseline vs target log window comparison

use super::miner::TemplateMiner;
use super::{LogClusterConfig, LogRecord, LogSeverity};
use serde::Serialize;

/// One template's movement between the two windows
#[derive(Debug, Clone, Serialize)]
pub struct PatternDiff {
    pub template: String,
    /// Highest severity observed for this pattern
    pub severity: LogSeverity,
    pub baseline_count: usize,
    pub target_count: usize,
    /// `target_count / baseline_count`; emergent patterns report the raw
    /// target count as the ratio
    pub growth_ratio: f64,
    /// Absent from the baseline window entirely
    pub emergent: bool,
    /// Grew more than `growth_factor` times faster than overall log traffic
    pub disproportionate: bool,
}

/// Comparison result over two log windows
#[derive(Debug, Clone, Serialize)]
pub struct LogReport {
    /// All flagged patterns, highest severity first, then by target count
    pub patterns: Vec<PatternDiff>,
    /// The subset of `patterns` absent from the baseline window entirely
    pub new_patterns: Vec<PatternDiff>,
}

impl LogReport {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Mine both windows with a shared miner (so template IDs align) and flag
/// emergent or disproportionately growing patterns
///
/// A pattern is reported when it is emergent (zero baseline occurrences) or
/// when its count grew more than `growth_factor` times the overall traffic
/// growth between the windows. Patterns below `min_pattern_count` target
/// occurrences are suppressed.
pub fn compare_windows(
    baseline: &[LogRecord],
    target: &[LogRecord],
    config: &LogClusterConfig,
) -> LogReport {
    let mut miner = TemplateMiner::new(config);

    let mut baseline_counts: Vec<usize> = Vec::new();
    for record in baseline {
        let id = miner.observe(record);
        if id >= baseline_counts.len() {
            baseline_counts.resize(id + 1, 0);
        }
        baseline_counts[id] += 1;
    }

    let mut target_counts: Vec<usize> = Vec::new();
    for record in target {
        let id = miner.observe(record);
        if id >= target_counts.len() {
            target_counts.resize(id + 1, 0);
        }
        target_counts[id] += 1;
    }

    // Overall traffic growth; a quiet baseline window defaults to 1.0 so that
    // emergence, not growth, drives flagging.
    let traffic_growth = if baseline.is_empty() {
        1.0
    } else {
        target.len() as f64 / baseline.len() as f64
    };

    let mut patterns = Vec::new();
    let mut new_patterns = Vec::new();

    for template in miner.templates() {
        let base_count = baseline_counts.get(template.id).copied().unwrap_or(0);
        let tgt_count = target_counts.get(template.id).copied().unwrap_or(0);
        if tgt_count < config.min_pattern_count {
            continue;
        }

        let emergent = base_count == 0;
        let growth_ratio = if base_count > 0 {
            tgt_count as f64 / base_count as f64
        } else {
            tgt_count as f64
        };
        let disproportionate =
            !emergent && growth_ratio > config.growth_factor * traffic_growth;

        if emergent || disproportionate {
            let diff = PatternDiff {
                template: template.render(),
                severity: template.dominant_severity(),
                baseline_count: base_count,
                target_count: tgt_count,
                growth_ratio,
                emergent,
                disproportionate,
            };
            if emergent {
                new_patterns.push(diff.clone());
            }
            patterns.push(diff);
        }
    }

    let rank = |a: &PatternDiff, b: &PatternDiff| {
        b.severity
            .cmp(&a.severity)
            .then(b.target_count.cmp(&a.target_count))
    };
    patterns.sort_by(rank);
    new_patterns.sort_by(rank);

    LogReport {
        patterns,
        new_patterns,
    }
}
