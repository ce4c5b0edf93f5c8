//! Log pattern mining and window comparison
//!
//! Groups raw log lines into templates by masking variable tokens (numbers,
//! hex IDs, UUIDs) and clustering on token similarity, then compares a
//! baseline window against a target window to surface emergent patterns and
//! patterns growing faster than overall traffic.
//!
//! The miner is deliberately simple: whitespace tokenization, single-pass
//! clustering, wildcard widening on merge. It trades recall on exotic log
//! formats for deterministic, order-stable template IDs.

mod compare;
mod miner;
mod template;

pub use compare::{compare_windows, LogReport, PatternDiff};
pub use miner::TemplateMiner;
pub use template::{LogTemplate, Token};

use serde::{Deserialize, Serialize};

/// Log severity, ordered so `Error > Warn > Info > Debug`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// A single log line with capture metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp_ms: f64,
    #[serde(default)]
    pub severity: LogSeverity,
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp_ms: f64, severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            severity,
            message: message.into(),
        }
    }
}

/// Tuning knobs for template clustering and window comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogClusterConfig {
    /// Fraction of token positions that must match for two lines to share a
    /// template (token counts must be equal)
    pub similarity_threshold: f64,
    /// Minimum target-window occurrences before a pattern is reported
    pub min_pattern_count: usize,
    /// A pattern growing more than this factor faster than overall traffic is
    /// flagged as disproportionate
    pub growth_factor: f64,
}

impl Default for LogClusterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            min_pattern_count: 1,
            growth_factor: 2.0,
        }
    }
}
