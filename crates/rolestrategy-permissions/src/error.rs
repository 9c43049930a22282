//! Error types for the role strategy

use thiserror::Error;

use crate::role::RoleCategory;

/// Result type for role strategy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, editing, or persisting role configuration.
///
/// Permission checks never return these; a failed check is a plain `false`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid pattern '{pattern}' for role '{role}': {source}")]
    InvalidPattern {
        role: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown permission '{permission}' in role '{role}'")]
    UnknownPermission { role: String, permission: String },

    #[error("Duplicate {category} role '{role}'")]
    DuplicateRole { category: RoleCategory, role: String },

    #[error("Unknown {category} role '{role}'")]
    UnknownRole { category: RoleCategory, role: String },

    #[error("Invalid assignment '{identity}' for role '{role}'")]
    InvalidAssignment { role: String, identity: String },

    #[error("Invalid permission implication: {0}")]
    InvalidImplication(String),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error rejects a configuration as a whole.
    ///
    /// These are reported to the operator while the previously active
    /// configuration stays in force.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidPattern { .. }
                | Error::UnknownPermission { .. }
                | Error::DuplicateRole { .. }
                | Error::UnknownRole { .. }
                | Error::InvalidAssignment { .. }
                | Error::InvalidImplication(_)
        )
    }
}

/// User-facing rejection of a proposed item name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameRejection {
    #[error(
        "'{}' does not match the job name convention pattern [{}]",
        .name,
        .patterns.join(", ")
    )]
    ConventionMismatch { name: String, patterns: Vec<String> },

    #[error("Item name must not be empty")]
    EmptyName,
}

impl NameRejection {
    /// Patterns the name was checked against, if any
    pub fn patterns(&self) -> &[String] {
        match self {
            NameRejection::ConventionMismatch { patterns, .. } => patterns,
            NameRejection::EmptyName => &[],
        }
    }
}
