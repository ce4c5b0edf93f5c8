//! Error taxonomy for analysis operations
//!
//! Only truly unusable input is fatal: a trace with no spans, or a sample
//! population below the statistical minimum. Data-quality defects (orphans,
//! negative durations, clock skew) are values collected into the
//! [`DataQualityReport`](crate::trace_forest::DataQualityReport), never errors.

use thiserror::Error;

/// Errors for analysis operations
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The trace has no spans at all - nothing to analyze.
    #[error("trace '{trace_id}' contains no spans")]
    EmptyTrace { trace_id: String },

    /// Too few samples for a statistically meaningful result. Non-fatal at
    /// the report level: callers surface it as a skipped-analysis note.
    #[error("insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
