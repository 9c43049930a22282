//! Role data models

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pattern::PatternMatcher;
use crate::permission::{Permission, PermissionRegistry};

/// Category a role belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleCategory {
    /// System-wide roles, checked without a resource name
    Global,
    /// Roles over jobs and folders
    Item,
    /// Roles over build agents
    Agent,
}

impl RoleCategory {
    /// All categories in export order
    pub const ALL: [RoleCategory; 3] = [
        RoleCategory::Global,
        RoleCategory::Item,
        RoleCategory::Agent,
    ];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCategory::Global => "global",
            RoleCategory::Item => "item",
            RoleCategory::Agent => "agent",
        }
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named bundle of permissions plus the pattern of resource names it
/// applies to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    name: String,
    pattern: PatternMatcher,
    permissions: BTreeSet<Permission>,
    description: Option<String>,
}

impl Role {
    /// Create a role
    pub fn new<I>(name: impl Into<String>, pattern: PatternMatcher, permissions: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        Self {
            name: name.into(),
            pattern,
            permissions: permissions.into_iter().collect(),
            description: None,
        }
    }

    /// Attach a free-form description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Role name, unique within its category
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled name pattern
    pub fn pattern(&self) -> &PatternMatcher {
        &self.pattern
    }

    /// Granted permissions in id order
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Free-form description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Check a resource name against the role pattern
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }

    /// Whether any granted permission implies `wanted`
    pub fn has_permission(&self, wanted: &Permission, registry: &PermissionRegistry) -> bool {
        registry
            .implication_chain(wanted)
            .any(|candidate| self.permissions.contains(candidate))
    }

    /// Whether the role grants any permission at all
    pub fn has_any_permission(&self) -> bool {
        !self.permissions.is_empty()
    }
}
