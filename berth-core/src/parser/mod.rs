//! Configuration grammar parsers
//!
//! This module parses the human-authored configuration text of a build step
//! into structured records. All grammars share the same batch rules:
//! - Records are separated by newlines (`\n` or `\r\n`); links use commas
//! - Empty input yields an empty result, never an error
//! - Blank records are skipped
//! - One malformed record aborts the whole batch; no partial results
//!
//! Each record is parsed with two delimiters: the grammar's primary
//! delimiter first, whitespace only if that parse fails. Values such as
//! paths may contain spaces, so the primary delimiter must win whenever it
//! yields a valid record.

pub mod bind;
pub mod link;
pub mod port;

pub use bind::parse_binds;
pub use link::parse_links;
pub use port::{parse_port_bindings, parse_port_specs};

use crate::error::{GrammarError, GrammarKind};

/// Why a single delimiter pass rejected a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordError {
    /// Wrong number of fields for this delimiter
    Shape(String),
    /// Right number of fields, but a field is invalid
    Token(String),
    /// Right number of fields, but a required one is empty
    Empty(&'static str),
}

impl RecordError {
    fn is_shape(&self) -> bool {
        matches!(self, RecordError::Shape(_))
    }

    fn into_grammar_error(self, kind: GrammarKind, record: usize, text: &str) -> GrammarError {
        match self {
            RecordError::Shape(reason) | RecordError::Token(reason) => {
                GrammarError::MalformedRecord {
                    kind,
                    record,
                    text: text.to_string(),
                    reason,
                }
            }
            RecordError::Empty(field) => GrammarError::EmptyRequiredField {
                kind,
                record,
                text: text.to_string(),
                field,
            },
        }
    }
}

/// Runs the primary pass, falling back to the whitespace pass
///
/// When both fail, the primary error is reported unless it only failed on
/// shape and the whitespace pass got as far as validating fields.
pub(crate) fn two_pass<T>(
    text: &str,
    primary: impl Fn(&str) -> Result<T, RecordError>,
    secondary: impl Fn(&str) -> Result<T, RecordError>,
) -> Result<T, RecordError> {
    let first = match primary(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match secondary(text) {
        Ok(value) => Ok(value),
        Err(second) if first.is_shape() && !second.is_shape() => Err(second),
        Err(_) => Err(first),
    }
}

/// Splits a line-oriented batch into numbered, trimmed, non-blank records
pub(crate) fn line_records(input: &str) -> impl Iterator<Item = (usize, &str)> {
    numbered(input.split('\n').map(|line| line.trim_end_matches('\r')))
}

/// Splits a comma-separated batch into numbered, trimmed, non-blank records
pub(crate) fn comma_records(input: &str) -> impl Iterator<Item = (usize, &str)> {
    numbered(input.split(','))
}

fn numbered<'a>(parts: impl Iterator<Item = &'a str>) -> impl Iterator<Item = (usize, &'a str)> {
    parts
        .enumerate()
        .map(|(index, part)| (index + 1, part.trim()))
        .filter(|(_, part)| !part.is_empty())
}

/// Parses every record of a batch, stopping at the first failure
pub(crate) fn parse_batch<'a, T>(
    kind: GrammarKind,
    records: impl Iterator<Item = (usize, &'a str)>,
    parse_record: impl Fn(&str) -> Result<T, RecordError>,
) -> Result<Vec<T>, GrammarError> {
    records
        .map(|(number, text)| {
            parse_record(text).map_err(|e| e.into_grammar_error(kind, number, text))
        })
        .collect()
}

/// Parses exactly one record outside of a batch
pub(crate) fn parse_one<T>(
    kind: GrammarKind,
    text: &str,
    parse_record: impl Fn(&str) -> Result<T, RecordError>,
) -> Result<T, GrammarError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GrammarError::MalformedRecord {
            kind,
            record: 1,
            text: text.to_string(),
            reason: "record is empty".to_string(),
        });
    }
    parse_record(trimmed).map_err(|e| e.into_grammar_error(kind, 1, trimmed))
}
