//! Error types for the configuration grammars

use thiserror::Error;

/// Result type alias for grammar parsing
pub type Result<T> = std::result::Result<T, GrammarError>;

/// Which grammar produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarKind {
    Bind,
    PortBinding,
    Link,
}

impl std::fmt::Display for GrammarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarKind::Bind => write!(f, "bind"),
            GrammarKind::PortBinding => write!(f, "port binding"),
            GrammarKind::Link => write!(f, "link"),
        }
    }
}

/// Errors raised while parsing a configuration batch
///
/// Every variant identifies the offending record by its 1-based position
/// in the batch (line number for line grammars, item number for links)
/// and carries the record text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// Record does not match its grammar
    #[error("malformed {kind} record {record} '{text}': {reason}")]
    MalformedRecord {
        kind: GrammarKind,
        record: usize,
        text: String,
        reason: String,
    },

    /// Record has the right shape but a required field is empty
    #[error("{kind} record {record} '{text}' has an empty {field}")]
    EmptyRequiredField {
        kind: GrammarKind,
        record: usize,
        text: String,
        field: &'static str,
    },
}

impl GrammarError {
    /// Position of the offending record within its batch
    pub fn record(&self) -> usize {
        match self {
            Self::MalformedRecord { record, .. } | Self::EmptyRequiredField { record, .. } => {
                *record
            }
        }
    }

    /// Text of the offending record
    pub fn text(&self) -> &str {
        match self {
            Self::MalformedRecord { text, .. } | Self::EmptyRequiredField { text, .. } => text,
        }
    }
}
