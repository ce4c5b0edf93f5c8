//! Single-pass template miner

use super::template::{LogTemplate, Token};
use super::{LogClusterConfig, LogRecord, LogSeverity};
use regex::Regex;
use tracing::debug;

/// Stand-in for a masked variable token
const MASKED: &str = "<*>";

/// Masks variable tokens before clustering so that IDs and measurements never
/// become literals
struct Masker {
    number: Regex,
    hex: Regex,
    uuid: Regex,
}

impl Masker {
    fn new() -> Self {
        // Patterns are compile-time constants; a failure here is a programming
        // error, not an input error.
        Self {
            number: Regex::new(r"^-?\d+(\.\d+)?(ms|s|us|ns|%|kb|mb|gb)?$").expect("static regex"),
            hex: Regex::new(r"^(0x)?[0-9a-fA-F]{8,}$").expect("static regex"),
            uuid: Regex::new(
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            )
            .expect("static regex"),
        }
    }

    fn is_variable(&self, token: &str) -> bool {
        self.number.is_match(token) || self.uuid.is_match(token) || self.hex.is_match(token)
    }
}

/// Clusters log lines into templates
///
/// Lines are tokenized on whitespace, variable tokens masked to wildcards,
/// then matched against existing templates of the same arity. The best match
/// at or above the similarity threshold absorbs the line (widening mismatched
/// positions to wildcards); otherwise the line seeds a new template.
///
/// Mining is deterministic: the same window observed in the same order always
/// yields the same template set and IDs.
pub struct TemplateMiner {
    templates: Vec<LogTemplate>,
    masker: Masker,
    similarity_threshold: f64,
}

impl TemplateMiner {
    pub fn new(config: &LogClusterConfig) -> Self {
        Self {
            templates: Vec::new(),
            masker: Masker::new(),
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Observe a log line, returning the ID of the template it joined
    pub fn observe(&mut self, record: &LogRecord) -> usize {
        let tokens = self.tokenize(&record.message);
        self.observe_tokens(tokens, record.severity)
    }

    /// Assign a log line against the existing templates without mutating them
    ///
    /// Returns `None` when no template clears the similarity threshold.
    /// Re-running a mined window through `assign` reproduces the IDs that
    /// `observe` handed out for it.
    pub fn assign(&self, record: &LogRecord) -> Option<usize> {
        let tokens = self.tokenize(&record.message);
        self.best_match(&tokens)
    }

    /// Best template for the tokens, if any clears the threshold
    ///
    /// Ties on similarity go to the template retaining the most literal
    /// matches, so a template that widened toward all-wildcards never steals
    /// lines from the more specific template they seeded.
    fn best_match(&self, tokens: &[String]) -> Option<usize> {
        self.templates
            .iter()
            .map(|t| (t.id, t.similarity(tokens), t.literal_matches(tokens)))
            .filter(|&(_, sim, _)| sim >= self.similarity_threshold)
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then(a.2.cmp(&b.2))
                    .then(b.0.cmp(&a.0))
            })
            .map(|(id, _, _)| id)
    }

    fn observe_tokens(&mut self, tokens: Vec<String>, severity: LogSeverity) -> usize {
        match self.best_match(&tokens) {
            Some(id) => {
                self.templates[id].absorb(&tokens, severity);
                id
            }
            None => {
                let id = self.templates.len();
                // Tokens already arrive masked; "<*>" marks a variable slot.
                let template_tokens = tokens
                    .into_iter()
                    .map(|t| {
                        if t == MASKED {
                            Token::Wildcard
                        } else {
                            Token::Literal(t)
                        }
                    })
                    .collect();
                debug!(template_id = id, "new log template");
                self.templates.push(LogTemplate::new(id, template_tokens, severity));
                id
            }
        }
    }

    fn tokenize(&self, message: &str) -> Vec<String> {
        message
            .split_whitespace()
            .map(|t| {
                if self.masker.is_variable(t) {
                    MASKED.to_string()
                } else {
                    t.to_string()
                }
            })
            .collect()
    }

    pub fn templates(&self) -> &[LogTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
