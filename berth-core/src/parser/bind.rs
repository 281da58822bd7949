//! Bind mount grammar
//!
//! One record per line: `hostPath:containerPath[:mode]`, or the same fields
//! separated by whitespace. `mode` is `ro` or `rw`, case-sensitive.

use super::{RecordError, line_records, parse_batch, parse_one, two_pass};
use crate::domain::bind::{AccessMode, BindSpec};
use crate::error::{GrammarKind, Result};

/// Parse a batch of bind mounts
///
/// # Arguments
/// * `input` - Newline-separated bind records
///
/// # Returns
/// The binds in input order; empty input gives an empty list
///
/// # Errors
/// Returns the first malformed record's error; no binds are returned then.
///
/// # Example
/// ```
/// use berth_core::domain::{AccessMode, BindSpec};
/// use berth_core::parser::parse_binds;
///
/// let binds = parse_binds("/var/cache:/cache:ro\n/src /workspace")?;
/// assert_eq!(binds[0], BindSpec::new("/var/cache", "/cache", AccessMode::ReadOnly));
/// assert_eq!(binds[1], BindSpec::new("/src", "/workspace", AccessMode::Default));
/// # Ok::<(), berth_core::GrammarError>(())
/// ```
pub fn parse_binds(input: &str) -> Result<Vec<BindSpec>> {
    parse_batch(GrammarKind::Bind, line_records(input), parse_record)
}

pub(crate) fn parse_single(text: &str) -> Result<BindSpec> {
    parse_one(GrammarKind::Bind, text, parse_record)
}

fn parse_record(text: &str) -> std::result::Result<BindSpec, RecordError> {
    two_pass(
        text,
        |t| from_fields(&t.split(':').collect::<Vec<_>>(), ':'),
        |t| from_fields(&t.split_whitespace().collect::<Vec<_>>(), ' '),
    )
}

fn from_fields(fields: &[&str], delimiter: char) -> std::result::Result<BindSpec, RecordError> {
    let (host, container, mode) = match fields {
        [host, container] => (*host, *container, None),
        [host, container, mode] => (*host, *container, Some(*mode)),
        _ => {
            return Err(RecordError::Shape(format!(
                "expected 2 or 3 '{}'-separated fields, found {}",
                delimiter.escape_default(),
                fields.len()
            )));
        }
    };

    if host.is_empty() {
        return Err(RecordError::Empty("host path"));
    }
    if container.is_empty() {
        return Err(RecordError::Empty("container path"));
    }
    // Engine bind strings are colon-delimited, so a path cannot carry one
    for path in [host, container] {
        if path.contains(':') {
            return Err(RecordError::Token(format!(
                "path '{}' contains ':'",
                path
            )));
        }
    }

    let access_mode = match mode {
        None => AccessMode::Default,
        Some("ro") => AccessMode::ReadOnly,
        Some("rw") => AccessMode::ReadWrite,
        Some(other) => {
            return Err(RecordError::Token(format!(
                "access mode must be 'ro' or 'rw', found '{}'",
                other
            )));
        }
    };

    Ok(BindSpec::new(host, container, access_mode))
}
