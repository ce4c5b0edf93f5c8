//! Analysis configuration
//!
//! Aggregates the tuning knobs of every analyzer into one TOML-loadable
//! struct. Every field has a default, so an empty file (or no file at all)
//! yields the stock configuration and deployments only override what they
//! need:
//!
//! ```toml
//! latency_noise_floor_ms = 2.5
//!
//! [anti_patterns]
//! n_plus_one_min_count = 5
//!
//! [stats]
//! z_score_threshold = 3.0
//! ```

use crate::anti_patterns::AntiPatternThresholds;
use crate::log_patterns::LogClusterConfig;
use crate::root_cause::RootCauseConfig;
use crate::stats::StatsConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Latency diffs at or below this are treated as measurement noise
    pub latency_noise_floor_ms: f64,
    pub anti_patterns: AntiPatternThresholds,
    pub root_cause: RootCauseConfig,
    pub stats: StatsConfig,
    pub log_clusters: LogClusterConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            latency_noise_floor_ms: 1.0,
            anti_patterns: AntiPatternThresholds::default(),
            root_cause: RootCauseConfig::default(),
            stats: StatsConfig::default(),
            log_clusters: LogClusterConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from a TOML file; missing sections fall back to defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML analysis config")
    }
}
