//! Container link records

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;

/// Link to another container under an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Name or id of the linked container
    pub name: String,
    pub alias: String,
}

impl LinkSpec {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }
}

impl std::fmt::Display for LinkSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.alias)
    }
}

impl std::str::FromStr for LinkSpec {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::link::parse_single(s)
    }
}
