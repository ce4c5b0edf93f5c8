//! Indagar - Telemetry diff and anomaly analysis engine
//!
//! This library compares distributed traces between a known-good baseline and
//! a suspect target, with critical-path attribution, anti-pattern detection,
//! causal root-cause scoring, statistical anomaly detection over latency
//! samples, and log pattern mining.

pub mod anti_patterns;
pub mod cache;
pub mod comparator;
pub mod config;
pub mod critical_path;
pub mod error;
pub mod log_patterns;
pub mod report;
pub mod root_cause;
pub mod span_record;
pub mod stats;
pub mod trace_forest;
