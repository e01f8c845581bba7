//! Container names taken from request paths.
//!
//! A container name ends up both in a filesystem path and in the argument list
//! of the init script, so only a conservative identifier alphabet is accepted.

use std::fmt;
use std::path::{Path, PathBuf};

/// Maximum length of a container name
pub const MAX_CONTAINER_NAME_LEN: usize = 64;

/// A validated container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid container name '{name}': {reason}")]
pub struct InvalidContainerName {
    pub name: String,
    pub reason: &'static str,
}

impl ContainerName {
    /// Parse a container name.
    ///
    /// Accepts 1 to 64 ASCII letters, digits, `-`, `_` and `.`, starting with a
    /// letter or digit. This rules out `.`, `..` and anything resembling a flag.
    pub fn parse(name: &str) -> Result<Self, InvalidContainerName> {
        let invalid = |reason| InvalidContainerName {
            name: name.to_string(),
            reason,
        };

        let first = name.chars().next().ok_or_else(|| invalid("name is empty"))?;
        if name.len() > MAX_CONTAINER_NAME_LEN {
            return Err(invalid("name is longer than 64 characters"));
        }
        if !first.is_ascii_alphanumeric() {
            return Err(invalid("name must start with a letter or digit"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid(
                "name may only contain letters, digits, '-', '_' and '.'",
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The container's data directory under `root`.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
