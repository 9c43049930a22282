//! Role-based naming convention for new and renamed items
//!
//! Restrictions are opt-in: an identity is only held to a naming convention
//! when one of its item roles that may create jobs carries a pattern.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::AuthorizationEngine;
use crate::error::NameRejection;
use crate::identity::Identity;
use crate::permission::registry::ids;
use crate::permission::Permission;
use crate::resource::{child_full_name, Resource};
use crate::role::{Role, RoleCategory};

/// Why a name is being checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCheck {
    /// A new item
    Create,
    /// An existing item receives a new name
    Rename { previous: String },
    /// An existing item is saved under its current name
    Existing,
}

/// Naming policy settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPolicy {
    /// Also hold already-existing names to the convention when they are
    /// saved again
    #[serde(default)]
    pub force_existing_jobs: bool,
}

impl NamingPolicy {
    /// Create a policy
    pub fn new(force_existing_jobs: bool) -> Self {
        Self { force_existing_jobs }
    }

    /// Validate `name` proposed by `identity` inside the `parent` folder
    /// (`None` for the top level).
    ///
    /// Accepted when a global role of the identity may create jobs, when an
    /// item role granted on the parent folder or one of the ancestors it
    /// carries may create jobs, or when the full name matches the pattern of
    /// at least one item role of the identity that may create jobs. An
    /// identity with no such patterned role is not restricted. A parent that
    /// is not an item counts as the top level.
    pub fn validate(
        &self,
        engine: &AuthorizationEngine,
        identity: &Identity,
        parent: Option<&Resource>,
        name: &str,
        check: &NameCheck,
    ) -> Result<(), NameRejection> {
        let unchanged = match check {
            NameCheck::Existing => true,
            NameCheck::Rename { previous } => previous == name,
            NameCheck::Create => false,
        };
        if unchanged && !self.force_existing_jobs {
            return Ok(());
        }

        if name.trim().is_empty() {
            return Err(NameRejection::EmptyName);
        }

        let registry = engine.registry();
        let create = registry
            .lookup(ids::JOB_CREATE)
            .cloned()
            .unwrap_or_else(|| Permission::new(ids::JOB_CREATE));
        let sids = identity.sids();
        let may_create = |role: &&Role| role.has_permission(&create, registry);

        let global = engine.role_map(RoleCategory::Global);
        if global.roles_granted_to(&sids).any(|role| may_create(&role)) {
            debug!(identity = %identity.name, name, "name accepted by global create role");
            return Ok(());
        }

        let items = engine.role_map(RoleCategory::Item);
        let folder = parent.filter(|p| p.category() == RoleCategory::Item && p.name() != Some(""));
        if let Some(folder) = folder {
            let scope = folder.candidates();
            let folder_grant = items
                .roles_granted_to(&sids)
                .filter(may_create)
                .any(|role| scope.iter().any(|candidate| role.matches(candidate)));
            if folder_grant {
                debug!(
                    identity = %identity.name,
                    parent = ?folder.name(),
                    name,
                    "name accepted by folder create role"
                );
                return Ok(());
            }
        }

        let restrictive: Vec<&Role> = items
            .roles_granted_to(&sids)
            .filter(may_create)
            .filter(|role| !role.pattern().is_empty())
            .collect();
        if restrictive.is_empty() {
            return Ok(());
        }

        let full_name = child_full_name(folder.and_then(Resource::name), name);
        if restrictive.iter().any(|role| role.matches(&full_name)) {
            return Ok(());
        }

        let patterns: Vec<String> = restrictive
            .iter()
            .filter_map(|role| role.pattern().source())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        warn!(
            identity = %identity.name,
            name = %full_name,
            ?patterns,
            "name rejected by naming convention"
        );
        Err(NameRejection::ConventionMismatch {
            name: name.to_string(),
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::pattern::PatternCache;
    use crate::permission::PermissionRegistry;
    use std::sync::Arc;

    fn engine() -> AuthorizationEngine {
        let registry = Arc::new(PermissionRegistry::standard());
        let mut engine = AuthorizationEngine::new(
            Arc::clone(&registry),
            Arc::new(PatternCache::new()),
            EngineSettings::default(),
        );

        let global = engine.role_map_mut(RoleCategory::Global);
        global
            .define_role("admin", None, [ids::ADMINISTER], None, &registry)
            .unwrap();
        global
            .define_role("readonly", None, [ids::READ, ids::JOB_READ], None, &registry)
            .unwrap();
        global.assign_role("admin", "admin").unwrap();
        global.assign_role("readonly", "authenticated").unwrap();

        let items = engine.role_map_mut(RoleCategory::Item);
        items
            .define_role(
                "creator",
                Some("34337_.*"),
                [ids::JOB_CREATE, ids::JOB_CONFIGURE],
                None,
                &registry,
            )
            .unwrap();
        items
            .define_role("team-folder", Some("Team"), [ids::JOB_CREATE], None, &registry)
            .unwrap();
        items
            .define_role("builder", Some("build_.*"), [ids::JOB_BUILD], None, &registry)
            .unwrap();
        items.assign_role("creator", "user3").unwrap();
        items.assign_role("team-folder", "user4").unwrap();
        items.assign_role("builder", "user5").unwrap();
        engine
    }

    #[test]
    fn test_create_matching_name() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user3 = Identity::user("user3");
        assert!(policy
            .validate(&engine, &user3, None, "34337_job", &NameCheck::Create)
            .is_ok());
    }

    #[test]
    fn test_create_mismatching_name() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user3 = Identity::user("user3");
        let rejection = policy
            .validate(&engine, &user3, None, "invalid_name", &NameCheck::Create)
            .unwrap_err();
        assert!(rejection
            .to_string()
            .contains("does not match the job name convention pattern"));
        assert_eq!(rejection.patterns(), ["34337_.*".to_string()]);
    }

    #[test]
    fn test_naming_pattern_is_anchored() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user3 = Identity::user("user3");
        assert!(policy
            .validate(&engine, &user3, None, "x34337_job", &NameCheck::Create)
            .is_err());
    }

    #[test]
    fn test_unrestricted_identities() {
        let engine = engine();
        let policy = NamingPolicy::default();
        // Global create through Administer
        assert!(policy
            .validate(&engine, &Identity::user("admin"), None, "anything", &NameCheck::Create)
            .is_ok());
        // Patterned role without create permission does not restrict
        assert!(policy
            .validate(&engine, &Identity::user("user5"), None, "anything", &NameCheck::Create)
            .is_ok());
        // No item roles at all
        assert!(policy
            .validate(&engine, &Identity::user("user1"), None, "anything", &NameCheck::Create)
            .is_ok());
    }

    #[test]
    fn test_folder_create_role_permits_names_inside() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user4 = Identity::user("user4");
        let team = Resource::item("Team");
        assert!(policy
            .validate(&engine, &user4, Some(&team), "whatever", &NameCheck::Create)
            .is_ok());
        let sub = Resource::item("Team/sub");
        assert!(policy
            .validate(&engine, &user4, Some(&sub), "whatever", &NameCheck::Create)
            .is_ok());
        // Outside the folder the role's pattern is the convention
        assert!(policy
            .validate(&engine, &user4, None, "whatever", &NameCheck::Create)
            .is_err());
        assert!(policy
            .validate(&engine, &user4, None, "Team", &NameCheck::Create)
            .is_ok());
    }

    #[test]
    fn test_folder_scope_uses_host_ancestors() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user4 = Identity::user("user4");

        // The host nests "Projects/sub" inside "Team" without a path prefix
        let nested = Resource::item_with_ancestors("Projects/sub", ["Projects", "Team"]);
        assert!(policy
            .validate(&engine, &user4, Some(&nested), "whatever", &NameCheck::Create)
            .is_ok());

        let detached = Resource::item_with_ancestors("Projects/sub", ["Projects"]);
        assert!(policy
            .validate(&engine, &user4, Some(&detached), "whatever", &NameCheck::Create)
            .is_err());
    }

    #[test]
    fn test_full_name_joins_parent_resource() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user3 = Identity::user("user3");
        let folder = Resource::item("other");

        // The convention applies to the joined full name
        let rejection = policy
            .validate(&engine, &user3, Some(&folder), "34337_job", &NameCheck::Create)
            .unwrap_err();
        assert_eq!(rejection.patterns(), ["34337_.*".to_string()]);
        assert!(policy
            .validate(&engine, &user3, Some(&Resource::Global), "34337_job", &NameCheck::Create)
            .is_ok());
    }

    #[test]
    fn test_rename_checks_new_name() {
        let engine = engine();
        let policy = NamingPolicy::default();
        let user3 = Identity::user("user3");
        let rename = NameCheck::Rename {
            previous: "34337_job_to_rename_existing".to_string(),
        };
        assert!(policy
            .validate(&engine, &user3, None, "34337_job_to_rename_new", &rename)
            .is_ok());
        assert!(policy
            .validate(&engine, &user3, None, "invalid_name", &rename)
            .is_err());
    }

    #[test]
    fn test_existing_names_only_checked_when_forced() {
        let engine = engine();
        let user3 = Identity::user("user3");
        let lenient = NamingPolicy::new(false);
        let strict = NamingPolicy::new(true);

        assert!(lenient
            .validate(&engine, &user3, None, "legacy", &NameCheck::Existing)
            .is_ok());
        assert!(strict
            .validate(&engine, &user3, None, "legacy", &NameCheck::Existing)
            .is_err());

        let same = NameCheck::Rename {
            previous: "legacy".to_string(),
        };
        assert!(lenient.validate(&engine, &user3, None, "legacy", &same).is_ok());
        assert!(strict.validate(&engine, &user3, None, "legacy", &same).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let engine = engine();
        let policy = NamingPolicy::default();
        assert_eq!(
            policy.validate(&engine, &Identity::user("admin"), None, " ", &NameCheck::Create),
            Err(NameRejection::EmptyName)
        );
    }
}
