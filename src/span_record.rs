//! Span and trace data model
//!
//! This module defines the canonical schema for spans handed to indagar by an
//! external telemetry collaborator (trace store, OTLP pipeline, export job).
//! Records arrive as a flat list and may be malformed; validation happens in
//! [`trace_forest`](crate::trace_forest), not here.
//!
//! # Design Principles
//!
//! 1. **Flat structure:** No parent/child object pointers. Relationships are
//!    resolved into an arena + index map so malformed or cyclic parent
//!    references cannot corrupt traversal.
//! 2. **String IDs:** Cloud trace stores deliver hex-encoded IDs; we keep them
//!    opaque rather than re-encoding into fixed-width byte arrays.
//! 3. **Millisecond timestamps:** All analysis thresholds (noise floors, gap
//!    windows, N+1 budgets) are specified in milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Span status (OpenTelemetry semantic convention, reduced to the two states
/// the diff engine distinguishes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Span completed successfully
    #[default]
    Ok,

    /// Span completed with an error
    Error,
}

/// A single timed unit of work within a trace
///
/// # Example
///
/// ```
/// use indagar::span_record::{SpanRecord, SpanStatus};
///
/// let span = SpanRecord::new("s1", None, "HTTP GET /checkout", 0.0, 120.0);
/// assert_eq!(span.duration_ms(), 120.0);
/// assert!(span.is_root());
/// assert_eq!(span.status, SpanStatus::Ok);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    /// Span ID, unique within its trace (uniqueness is validated, not assumed)
    pub span_id: String,

    /// Parent span ID; `None` marks a root span. A parent ID that resolves to
    /// no span in the set makes this span an orphan (reported, not fatal).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_span_id: Option<String>,

    /// Human-readable operation name (e.g., "db.query", "HTTP GET")
    pub name: String,

    /// Start time in milliseconds since UNIX epoch
    pub start_time_ms: f64,

    /// End time in milliseconds since UNIX epoch. `end < start` is flagged as
    /// a NegativeDuration defect by the normalizer.
    pub end_time_ms: f64,

    /// Completion status
    #[serde(default)]
    pub status: SpanStatus,

    /// String-keyed attribute map
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl SpanRecord {
    /// Create a span with default status and no attributes
    pub fn new(
        span_id: impl Into<String>,
        parent_span_id: Option<&str>,
        name: impl Into<String>,
        start_time_ms: f64,
        end_time_ms: f64,
    ) -> Self {
        Self {
            span_id: span_id.into(),
            parent_span_id: parent_span_id.map(str::to_string),
            name: name.into(),
            start_time_ms,
            end_time_ms,
            status: SpanStatus::Ok,
            attributes: HashMap::new(),
        }
    }

    /// Builder-style status override
    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder-style attribute insertion
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Span duration in milliseconds, clamped to >= 0 for malformed intervals
    pub fn duration_ms(&self) -> f64 {
        (self.end_time_ms - self.start_time_ms).max(0.0)
    }

    /// Whether the recorded interval is usable for temporal calculations
    pub fn has_valid_interval(&self) -> bool {
        self.end_time_ms >= self.start_time_ms
            && self.start_time_ms.is_finite()
            && self.end_time_ms.is_finite()
    }

    /// Check if this is a root span (no parent reference at all)
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Check if this span represents an error
    pub fn is_error(&self) -> bool {
        self.status == SpanStatus::Error
    }
}

/// A set of spans sharing a trace ID
///
/// Ordering of `spans` is not significant; the normalizer derives roots and
/// child adjacency itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub trace_id: String,
    pub spans: Vec<SpanRecord>,
}

impl Trace {
    pub fn new(trace_id: impl Into<String>, spans: Vec<SpanRecord>) -> Self {
        Self {
            trace_id: trace_id.into(),
            spans,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }
}
