//! Log template representation

use super::LogSeverity;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One token position in a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    /// Fixed text that appeared identically in every clustered line
    Literal(String),
    /// Position that varied across clustered lines (or matched a mask rule)
    Wildcard,
}

impl Token {
    /// Whether this template token accepts the given message token
    pub fn matches(&self, other: &str) -> bool {
        match self {
            Token::Literal(text) => text == other,
            Token::Wildcard => true,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(text) => f.write_str(text),
            Token::Wildcard => f.write_str("<*>"),
        }
    }
}

/// A mined log pattern with occurrence count
#[derive(Debug, Clone, Serialize)]
pub struct LogTemplate {
    pub id: usize,
    pub tokens: Vec<Token>,
    /// Lines absorbed into this template
    pub count: usize,
    /// Per-severity occurrence histogram
    pub severity_counts: BTreeMap<LogSeverity, usize>,
}

impl LogTemplate {
    pub fn new(id: usize, tokens: Vec<Token>, severity: LogSeverity) -> Self {
        Self {
            id,
            tokens,
            count: 1,
            severity_counts: BTreeMap::from([(severity, 1)]),
        }
    }

    /// Highest severity with at least one occurrence
    pub fn dominant_severity(&self) -> LogSeverity {
        self.severity_counts
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Fraction of positions where this template accepts the message tokens.
    /// Returns 0 when token counts differ; templates never merge across
    /// different arities.
    pub fn similarity(&self, tokens: &[String]) -> f64 {
        if self.tokens.len() != tokens.len() || tokens.is_empty() {
            return 0.0;
        }
        let matches = self
            .tokens
            .iter()
            .zip(tokens.iter())
            .filter(|(t, s)| t.matches(s))
            .count();
        matches as f64 / tokens.len() as f64
    }

    /// Number of positions where a literal token matches exactly
    ///
    /// Distinguishes a template that still carries the line's words from one
    /// that merely widened far enough to accept anything.
    pub fn literal_matches(&self, tokens: &[String]) -> usize {
        self.tokens
            .iter()
            .zip(tokens.iter())
            .filter(|(slot, token)| match slot {
                Token::Literal(text) => text == *token,
                Token::Wildcard => false,
            })
            .count()
    }

    /// Absorb a line: widen mismatching positions to wildcards, bump the
    /// count and the severity histogram
    pub fn absorb(&mut self, tokens: &[String], severity: LogSeverity) {
        for (slot, token) in self.tokens.iter_mut().zip(tokens.iter()) {
            if !slot.matches(token) {
                *slot = Token::Wildcard;
            }
        }
        self.count += 1;
        *self.severity_counts.entry(severity).or_insert(0) += 1;
    }

    /// Rendered pattern, wildcards shown as `<*>`
    pub fn render(&self) -> String {
        self.tokens
            .iter()
            .map(Token::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
