//! Statistical anomaly detection over latency samples
//!
//! Consumes per-operation latency samples from repeated trace captures and
//! answers three questions: where does the current window sit in the
//! historical distribution (percentiles), is it anomalous (z-score against
//! the historical mean), and which way is it heading (first-half vs
//! second-half trend).
//!
//! Vector math runs on `trueno` SIMD vectors in f32; the public API stays f64
//! because span timestamps are f64 epoch milliseconds. The f32 round-trip
//! costs < 0.01% relative error, well under measurement jitter.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Minimum samples for any analysis that characterizes a distribution: trend
/// detection, and the historical window of a z-score. Exact order statistics
/// (percentiles, summaries) are defined for any non-empty sample set and are
/// not held to this floor.
pub const MIN_SAMPLES: usize = 3;

/// Tuning knobs for anomaly and trend detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// |z| above this marks the current window anomalous
    pub z_score_threshold: f64,
    /// Percent change between window halves that counts as a trend
    pub trend_threshold_pct: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 2.0,
            trend_threshold_pct: 15.0,
        }
    }
}

/// Direction of latency drift across a sample window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Degrading,
    Improving,
    Stable,
}

/// Latency distribution summary for one operation
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub sample_count: usize,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Anomaly verdict for a current window against a historical window
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyVerdict {
    pub z_score: f64,
    pub is_anomalous: bool,
    pub current_mean_ms: f64,
    pub historical_mean_ms: f64,
}

/// Full statistical comparison of a current latency window against history
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub historical: LatencySummary,
    pub current: LatencySummary,
    pub verdict: AnomalyVerdict,
    /// Drift over the current window; `None` when it is too short to judge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    /// Analyses that could not run for these windows, by name
    pub skipped_analyses: Vec<String>,
}

fn to_f32(samples: &[f64]) -> Vec<f32> {
    samples.iter().map(|&v| v as f32).collect()
}

fn mean(samples: &[f64]) -> f64 {
    let v = Vector::from_slice(&to_f32(samples));
    v.mean().unwrap_or(0.0) as f64
}

fn stddev(samples: &[f64]) -> f64 {
    let v = Vector::from_slice(&to_f32(samples));
    v.stddev().unwrap_or(0.0) as f64
}

/// Percentile via linear interpolation between closest ranks
///
/// `p` is in [0, 100]. Empty input returns 0.
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

/// Summarize a latency sample set
pub fn summarize(samples: &[f64]) -> Result<LatencySummary> {
    if samples.is_empty() {
        return Err(AnalysisError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    Ok(LatencySummary {
        sample_count: samples.len(),
        mean_ms: mean(samples),
        stddev_ms: stddev(samples),
        p50_ms: percentile(samples, 50.0),
        p90_ms: percentile(samples, 90.0),
        p95_ms: percentile(samples, 95.0),
        p99_ms: percentile(samples, 99.0),
    })
}

/// Z-score of the current window's mean against the historical distribution
///
/// The historical window must hold at least [`MIN_SAMPLES`] samples; a
/// shorter history has no meaningful spread to score against. A zero
/// historical stddev (constant history) yields a z-score of 0 rather
/// than infinity; a flat history with a shifted current window still surfaces
/// through [`detect_trend`] and the latency diff itself.
pub fn z_score(current: &[f64], historical: &[f64]) -> Result<AnomalyVerdict> {
    z_score_with(current, historical, &StatsConfig::default())
}

pub fn z_score_with(
    current: &[f64],
    historical: &[f64],
    config: &StatsConfig,
) -> Result<AnomalyVerdict> {
    if current.is_empty() {
        return Err(AnalysisError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if historical.len() < MIN_SAMPLES {
        return Err(AnalysisError::InsufficientData {
            required: MIN_SAMPLES,
            actual: historical.len(),
        });
    }
    let current_mean = mean(current);
    let historical_mean = mean(historical);
    let historical_stddev = stddev(historical);

    let z = if historical_stddev > 0.0 {
        (current_mean - historical_mean) / historical_stddev
    } else {
        0.0
    };

    Ok(AnomalyVerdict {
        z_score: z,
        is_anomalous: z.abs() > config.z_score_threshold,
        current_mean_ms: current_mean,
        historical_mean_ms: historical_mean,
    })
}

/// Compare a current latency window against a historical one
///
/// Both windows must be non-empty. A current window below the trend minimum
/// does not fail the comparison; the trend is omitted and noted in
/// `skipped_analyses`.
pub fn compare_windows(
    historical: &[f64],
    current: &[f64],
    config: &StatsConfig,
) -> Result<StatsReport> {
    let verdict = z_score_with(current, historical, config)?;
    let mut skipped_analyses = Vec::new();
    let trend = match detect_trend_with(current, config) {
        Ok(trend) => Some(trend),
        Err(AnalysisError::InsufficientData { .. }) => {
            skipped_analyses.push("trend".to_string());
            None
        }
        Err(e) => return Err(e),
    };

    Ok(StatsReport {
        historical: summarize(historical)?,
        current: summarize(current)?,
        verdict,
        trend,
        skipped_analyses,
    })
}

/// Classify drift by comparing the mean of the first half of the window to
/// the mean of the second half
///
/// Requires at least [`MIN_SAMPLES`] samples; the odd middle sample lands in
/// the second half.
pub fn detect_trend(samples: &[f64]) -> Result<Trend> {
    detect_trend_with(samples, &StatsConfig::default())
}

pub fn detect_trend_with(samples: &[f64], config: &StatsConfig) -> Result<Trend> {
    if samples.len() < MIN_SAMPLES {
        return Err(AnalysisError::InsufficientData {
            required: MIN_SAMPLES,
            actual: samples.len(),
        });
    }
    let mid = samples.len() / 2;
    let first_mean = mean(&samples[..mid]);
    let second_mean = mean(&samples[mid..]);

    if first_mean == 0.0 {
        return Ok(if second_mean > 0.0 {
            Trend::Degrading
        } else {
            Trend::Stable
        });
    }

    let change_pct = (second_mean - first_mean) / first_mean * 100.0;
    Ok(if change_pct > config.trend_threshold_pct {
        Trend::Degrading
    } else if change_pct < -config.trend_threshold_pct {
        Trend::Improving
    } else {
        Trend::Stable
    })
}
