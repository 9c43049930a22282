//! Acting identities and the SIDs they are checked under

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Pseudo-group every authenticated identity belongs to
pub const AUTHENTICATED: &str = "authenticated";

/// Pseudo-identity of unauthenticated requests
pub const ANONYMOUS: &str = "anonymous";

/// A user as seen by the engine: name, resolved groups, and whether it
/// authenticated.
///
/// Group membership is resolved by the host before the call; the engine
/// treats it as a plain snapshot and makes no consistency assumptions
/// between two calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub authenticated: bool,
}

impl Identity {
    /// An authenticated user without groups
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeSet::new(),
            authenticated: true,
        }
    }

    /// The anonymous identity
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS.to_string(),
            groups: BTreeSet::new(),
            authenticated: false,
        }
    }

    /// Add a group membership
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Add several group memberships
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Check whether this is the anonymous identity
    pub fn is_anonymous(&self) -> bool {
        !self.authenticated
    }

    /// Every SID a role assignment may name for this identity: the user
    /// name, each group, and `authenticated` or `anonymous`.
    pub fn sids(&self) -> BTreeSet<&str> {
        let mut sids: BTreeSet<&str> = self.groups.iter().map(String::as_str).collect();
        sids.insert(&self.name);
        sids.insert(if self.authenticated { AUTHENTICATED } else { ANONYMOUS });
        sids
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}
