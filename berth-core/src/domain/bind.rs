//! Bind mount records

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;

/// Access mode of a bind mount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    /// No mode given; the engine decides
    #[default]
    Default,
}

impl AccessMode {
    /// Wire token for the mode, if any
    pub fn token(self) -> Option<&'static str> {
        match self {
            AccessMode::ReadOnly => Some("ro"),
            AccessMode::ReadWrite => Some("rw"),
            AccessMode::Default => None,
        }
    }
}

/// A host path exposed inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindSpec {
    pub host_path: String,
    pub container_path: String,
    pub access_mode: AccessMode,
}

impl BindSpec {
    pub fn new(
        host_path: impl Into<String>,
        container_path: impl Into<String>,
        access_mode: AccessMode,
    ) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            access_mode,
        }
    }
}

/// Engine form: `host:container[:mode]`
impl std::fmt::Display for BindSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host_path, self.container_path)?;
        if let Some(mode) = self.access_mode.token() {
            write!(f, ":{}", mode)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for BindSpec {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::bind::parse_single(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        let bind = BindSpec::new("/host", "/container", AccessMode::Default);
        assert_eq!(bind.to_string(), "/host:/container");

        let bind = BindSpec::new("/data", "/srv/data", AccessMode::ReadOnly);
        assert_eq!(bind.to_string(), "/data:/srv/data:ro");
    }

    #[test]
    fn test_from_str() {
        let bind: BindSpec = "/a /b rw".parse().unwrap();
        assert_eq!(bind, BindSpec::new("/a", "/b", AccessMode::ReadWrite));
    }
}
