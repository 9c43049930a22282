//! Resources a permission is checked against

use crate::role::RoleCategory;

/// Separator between path segments of an item full name
pub const PATH_SEPARATOR: char = '/';

/// A resource as supplied by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// The system itself
    Global,
    /// A job or folder with its containing folders, innermost first
    Item {
        full_name: String,
        ancestors: Vec<String>,
    },
    /// A build agent
    Agent { name: String },
}

impl Resource {
    /// An item whose ancestor chain follows its `/`-separated full name.
    ///
    /// `A/B/job` yields the ancestors `A/B` and `A`.
    pub fn item(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let ancestors = ancestors_of(&full_name);
        Resource::Item {
            full_name,
            ancestors,
        }
    }

    /// An item with an ancestor chain produced by the host, innermost first
    pub fn item_with_ancestors<I, S>(full_name: impl Into<String>, ancestors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Resource::Item {
            full_name: full_name.into(),
            ancestors: ancestors.into_iter().map(Into::into).collect(),
        }
    }

    /// A build agent
    pub fn agent(name: impl Into<String>) -> Self {
        Resource::Agent { name: name.into() }
    }

    /// The role category consulted for this resource
    pub fn category(&self) -> RoleCategory {
        match self {
            Resource::Global => RoleCategory::Global,
            Resource::Item { .. } => RoleCategory::Item,
            Resource::Agent { .. } => RoleCategory::Agent,
        }
    }

    /// The resource's own name, `None` for the system
    pub fn name(&self) -> Option<&str> {
        match self {
            Resource::Global => None,
            Resource::Item { full_name, .. } => Some(full_name),
            Resource::Agent { name } => Some(name),
        }
    }

    /// Names to evaluate role patterns against, the resource itself first
    /// and then each ancestor outwards
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            Resource::Global => Vec::new(),
            Resource::Item {
                full_name,
                ancestors,
            } => std::iter::once(full_name.as_str())
                .chain(ancestors.iter().map(String::as_str))
                .collect(),
            Resource::Agent { name } => vec![name.as_str()],
        }
    }
}

/// Ancestor full names of a `/`-separated item name, innermost first
pub fn ancestors_of(full_name: &str) -> Vec<String> {
    let mut ancestors = Vec::new();
    let mut rest = full_name;
    while let Some((parent, _)) = rest.rsplit_once(PATH_SEPARATOR) {
        if !parent.is_empty() {
            ancestors.push(parent.to_string());
        }
        rest = parent;
    }
    ancestors
}

/// Join a parent folder and a child name into a full name
pub fn child_full_name(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}{}{}", parent, PATH_SEPARATOR, name),
        _ => name.to_string(),
    }
}
