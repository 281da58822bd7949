//! Container link grammar
//!
//! A comma-separated list of `nameOrId:alias` pairs. Each pair holds exactly
//! one delimiter; whitespace is accepted in place of the colon.

use super::{RecordError, comma_records, parse_batch, parse_one, two_pass};
use crate::domain::link::LinkSpec;
use crate::error::{GrammarKind, Result};

/// Parse a comma-separated list of links
///
/// # Example
/// ```
/// use berth_core::domain::LinkSpec;
/// use berth_core::parser::parse_links;
///
/// assert!(parse_links("")?.is_empty());
/// assert_eq!(parse_links("web:alias")?, vec![LinkSpec::new("web", "alias")]);
/// # Ok::<(), berth_core::GrammarError>(())
/// ```
pub fn parse_links(input: &str) -> Result<Vec<LinkSpec>> {
    parse_batch(GrammarKind::Link, comma_records(input), parse_record)
}

pub(crate) fn parse_single(text: &str) -> Result<LinkSpec> {
    parse_one(GrammarKind::Link, text, parse_record)
}

fn parse_record(text: &str) -> std::result::Result<LinkSpec, RecordError> {
    two_pass(
        text,
        |t| from_fields(&t.split(':').collect::<Vec<_>>(), "':'"),
        |t| from_fields(&t.split_whitespace().collect::<Vec<_>>(), "whitespace"),
    )
}

fn from_fields(fields: &[&str], delimiter: &str) -> std::result::Result<LinkSpec, RecordError> {
    let [name, alias] = fields else {
        return Err(RecordError::Shape(format!(
            "expected exactly one {} delimiter",
            delimiter
        )));
    };

    let name = name.trim();
    let alias = alias.trim();

    if name.is_empty() {
        return Err(RecordError::Empty("container name"));
    }
    if alias.is_empty() {
        return Err(RecordError::Empty("alias"));
    }

    for value in [name, alias] {
        if value.contains(':') || value.contains(char::is_whitespace) {
            return Err(RecordError::Token(format!(
                "'{}' may not contain ':' or whitespace",
                value
            )));
        }
    }

    Ok(LinkSpec::new(name, alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarError;

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_links("").unwrap().is_empty());
        assert!(parse_links(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_single_link() {
        assert_eq!(
            parse_links("web:alias").unwrap(),
            vec![LinkSpec::new("web", "alias")]
        );
    }

    #[test]
    fn test_multiple_links() {
        let links = parse_links("db:database, cache redis,3f2a9c:worker").unwrap();
        assert_eq!(
            links,
            vec![
                LinkSpec::new("db", "database"),
                LinkSpec::new("cache", "redis"),
                LinkSpec::new("3f2a9c", "worker"),
            ]
        );
    }

    #[test]
    fn test_two_delimiters_is_malformed() {
        let err = parse_links("web:a:b").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedRecord { record: 1, .. }));
    }

    #[test]
    fn test_missing_delimiter_is_malformed() {
        let err = parse_links("web:alias,lonely").unwrap_err();
        assert_eq!(err.record(), 2);
        assert_eq!(err.text(), "lonely");
    }

    #[test]
    fn test_empty_alias() {
        let err = parse_links("web:").unwrap_err();
        assert!(matches!(
            err,
            GrammarError::EmptyRequiredField { field: "alias", .. }
        ));
    }

    #[test]
    fn test_names_with_spaces_are_rejected() {
        assert!(parse_links("my web:alias").is_err());
    }
}
