//! Permission data models

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque permission identifier understood by the host, e.g. `Job/Read`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Create a permission from its textual id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The textual id
    pub fn id(&self) -> &str {
        &self.0
    }

    /// The group part of a `Group/Name` id (`Job` for `Job/Read`)
    pub fn group(&self) -> &str {
        self.0.split_once('/').map(|(group, _)| group).unwrap_or("")
    }

    /// The name part of a `Group/Name` id (`Read` for `Job/Read`)
    pub fn name(&self) -> &str {
        self.0
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Permission {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}
