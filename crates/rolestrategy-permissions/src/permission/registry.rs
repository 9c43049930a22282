//! Registry of known permissions and their implication table
//!
//! Each permission may name a single `implied_by` parent: holding the parent
//! grants the child. Parents must be registered before their children, which
//! keeps the relation acyclic.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::permission::models::Permission;
use crate::role::RoleCategory;

/// Ids of the standard CI-server permission catalogue
pub mod ids {
    pub const ADMINISTER: &str = "Overall/Administer";
    pub const READ: &str = "Overall/Read";
    pub const SYSTEM_READ: &str = "Overall/SystemRead";
    pub const RUN_SCRIPTS: &str = "Overall/RunScripts";

    pub const JOB_READ: &str = "Job/Read";
    pub const JOB_DISCOVER: &str = "Job/Discover";
    pub const JOB_CONFIGURE: &str = "Job/Configure";
    pub const JOB_BUILD: &str = "Job/Build";
    pub const JOB_CANCEL: &str = "Job/Cancel";
    pub const JOB_DELETE: &str = "Job/Delete";
    pub const JOB_CREATE: &str = "Job/Create";
    pub const JOB_MOVE: &str = "Job/Move";
    pub const JOB_WORKSPACE: &str = "Job/Workspace";

    pub const RUN_DELETE: &str = "Run/Delete";
    pub const RUN_UPDATE: &str = "Run/Update";
    pub const RUN_REPLAY: &str = "Run/Replay";

    pub const AGENT_BUILD: &str = "Agent/Build";
    pub const AGENT_CONFIGURE: &str = "Agent/Configure";
    pub const AGENT_CONNECT: &str = "Agent/Connect";
    pub const AGENT_CREATE: &str = "Agent/Create";
    pub const AGENT_DELETE: &str = "Agent/Delete";
    pub const AGENT_DISCONNECT: &str = "Agent/Disconnect";

    pub const VIEW_READ: &str = "View/Read";
    pub const VIEW_CONFIGURE: &str = "View/Configure";
    pub const VIEW_CREATE: &str = "View/Create";
    pub const VIEW_DELETE: &str = "View/Delete";

    pub const SCM_TAG: &str = "SCM/Tag";
}

/// Known permissions with their implied-by relation
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    implied_by: BTreeMap<Permission, Option<Permission>>,
    read: BTreeMap<RoleCategory, Permission>,
}

const ADMIN: Option<&str> = Some(ids::ADMINISTER);

/// Ids of the standard catalogue with their parents; parents come first
const STANDARD: &[(&str, Option<&str>)] = &[
    (ids::ADMINISTER, None),
    (ids::READ, ADMIN),
    (ids::SYSTEM_READ, ADMIN),
    (ids::RUN_SCRIPTS, ADMIN),
    (ids::JOB_READ, ADMIN),
    (ids::JOB_DISCOVER, Some(ids::JOB_READ)),
    (ids::JOB_CONFIGURE, ADMIN),
    (ids::JOB_BUILD, ADMIN),
    (ids::JOB_CANCEL, ADMIN),
    (ids::JOB_DELETE, ADMIN),
    (ids::JOB_CREATE, ADMIN),
    (ids::JOB_MOVE, ADMIN),
    (ids::JOB_WORKSPACE, ADMIN),
    (ids::RUN_DELETE, ADMIN),
    (ids::RUN_UPDATE, ADMIN),
    (ids::RUN_REPLAY, ADMIN),
    (ids::AGENT_BUILD, ADMIN),
    (ids::AGENT_CONFIGURE, ADMIN),
    (ids::AGENT_CONNECT, ADMIN),
    (ids::AGENT_CREATE, ADMIN),
    (ids::AGENT_DELETE, ADMIN),
    (ids::AGENT_DISCONNECT, ADMIN),
    (ids::VIEW_READ, ADMIN),
    (ids::VIEW_CONFIGURE, ADMIN),
    (ids::VIEW_CREATE, ADMIN),
    (ids::VIEW_DELETE, ADMIN),
    (ids::SCM_TAG, ADMIN),
];

impl PermissionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard CI-server catalogue.
    ///
    /// Everything is implied by `Overall/Administer`, `Job/Discover` is
    /// implied by `Job/Read`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (id, parent) in STANDARD {
            let registered = registry.register(Permission::new(*id), parent.map(Permission::new));
            debug_assert!(registered.is_ok(), "standard permission {id} listed before its parent");
        }

        registry
            .read
            .insert(RoleCategory::Global, Permission::new(ids::READ));
        registry
            .read
            .insert(RoleCategory::Item, Permission::new(ids::JOB_READ));
        registry
    }

    /// Register a permission, optionally implied by an already-known parent
    pub fn register(
        &mut self,
        permission: Permission,
        implied_by: Option<Permission>,
    ) -> Result<()> {
        if let Some(parent) = &implied_by {
            if parent == &permission {
                return Err(Error::InvalidImplication(format!(
                    "'{}' cannot imply itself",
                    permission
                )));
            }
            if !self.implied_by.contains_key(parent) {
                return Err(Error::InvalidImplication(format!(
                    "'{}' is implied by unknown permission '{}'",
                    permission, parent
                )));
            }
        }

        match self.implied_by.get(&permission) {
            Some(existing) if existing != &implied_by => Err(Error::InvalidImplication(format!(
                "'{}' is already registered with a different parent",
                permission
            ))),
            Some(_) => Ok(()),
            None => {
                self.implied_by.insert(permission, implied_by);
                Ok(())
            }
        }
    }

    /// Set the permission the authenticated-read fallback grants for a category
    pub fn set_read_permission(
        &mut self,
        category: RoleCategory,
        permission: Permission,
    ) -> Result<()> {
        if !self.contains(permission.id()) {
            return Err(Error::InvalidImplication(format!(
                "read permission '{}' is not registered",
                permission
            )));
        }
        self.read.insert(category, permission);
        Ok(())
    }

    /// The read permission of a category, if it has one
    pub fn read_permission(&self, category: RoleCategory) -> Option<&Permission> {
        self.read.get(&category)
    }

    /// Check whether a permission id is known
    pub fn contains(&self, id: &str) -> bool {
        self.implied_by.contains_key(id)
    }

    /// Resolve a permission id to its registered permission
    pub fn lookup(&self, id: &str) -> Option<&Permission> {
        self.implied_by.get_key_value(id).map(|(permission, _)| permission)
    }

    /// The direct parent of a permission
    pub fn parent(&self, permission: &Permission) -> Option<&Permission> {
        self.implied_by.get(permission).and_then(Option::as_ref)
    }

    /// Check whether holding `held` grants `wanted`
    pub fn implies(&self, held: &Permission, wanted: &Permission) -> bool {
        self.implication_chain(wanted).any(|p| p == held)
    }

    /// `wanted` followed by every permission that implies it, nearest first
    pub fn implication_chain<'a>(
        &'a self,
        wanted: &'a Permission,
    ) -> impl Iterator<Item = &'a Permission> + 'a {
        std::iter::successors(Some(wanted), move |current| self.parent(current))
    }

    /// All registered permissions in id order
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.implied_by.keys()
    }

    /// Number of registered permissions
    pub fn len(&self) -> usize {
        self.implied_by.len()
    }

    /// Check if no permission is registered
    pub fn is_empty(&self) -> bool {
        self.implied_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(id: &str) -> Permission {
        Permission::new(id)
    }

    #[test]
    fn test_standard_catalogue() {
        let registry = PermissionRegistry::standard();
        assert!(registry.contains(ids::ADMINISTER));
        assert!(registry.contains(ids::JOB_DISCOVER));
        assert!(registry.contains(ids::AGENT_BUILD));
        assert!(!registry.contains("Job/Fly"));
        assert_eq!(registry.permissions().count(), registry.len());
    }

    #[test]
    fn test_standard_table_registers_every_entry() {
        let registry = PermissionRegistry::standard();
        assert_eq!(registry.len(), STANDARD.len());
        for (id, parent) in STANDARD {
            let permission = registry.lookup(id).unwrap();
            assert_eq!(registry.parent(permission).map(Permission::id), *parent, "{}", id);
        }

        let mut replayed = PermissionRegistry::new();
        for (id, parent) in STANDARD {
            replayed
                .register(perm(id), parent.map(perm))
                .unwrap_or_else(|err| panic!("{id}: {err}"));
        }
    }

    #[test]
    fn test_administer_implies_everything() {
        let registry = PermissionRegistry::standard();
        let admin = perm(ids::ADMINISTER);
        for permission in registry.permissions() {
            assert!(registry.implies(&admin, permission), "{}", permission);
        }
    }

    #[test]
    fn test_read_implies_discover_only() {
        let registry = PermissionRegistry::standard();
        let read = perm(ids::JOB_READ);
        assert!(registry.implies(&read, &perm(ids::JOB_READ)));
        assert!(registry.implies(&read, &perm(ids::JOB_DISCOVER)));
        assert!(!registry.implies(&read, &perm(ids::JOB_CONFIGURE)));
        assert!(!registry.implies(&perm(ids::JOB_DISCOVER), &read));
    }

    #[test]
    fn test_run_scripts_needs_administer() {
        let registry = PermissionRegistry::standard();
        let scripts = perm(ids::RUN_SCRIPTS);
        assert!(!registry.implies(&perm(ids::READ), &scripts));
        assert!(!registry.implies(&perm(ids::JOB_CONFIGURE), &scripts));
        assert!(registry.implies(&perm(ids::ADMINISTER), &scripts));
    }

    #[test]
    fn test_implication_chain_order() {
        let registry = PermissionRegistry::standard();
        let discover = perm(ids::JOB_DISCOVER);
        let chain: Vec<&str> = registry
            .implication_chain(&discover)
            .map(Permission::id)
            .collect();
        assert_eq!(chain, vec![ids::JOB_DISCOVER, ids::JOB_READ, ids::ADMINISTER]);
    }

    #[test]
    fn test_unknown_permission_only_implies_itself() {
        let registry = PermissionRegistry::standard();
        let custom = perm("Custom/Thing");
        assert!(registry.implies(&custom, &custom));
        assert!(!registry.implies(&perm(ids::ADMINISTER), &custom));
    }

    #[test]
    fn test_register_rejects_dangling_parent() {
        let mut registry = PermissionRegistry::new();
        let err = registry
            .register(perm("Job/Read"), Some(perm("Overall/Administer")))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidImplication(_)));
    }

    #[test]
    fn test_register_rejects_self_and_reparenting() {
        let mut registry = PermissionRegistry::new();
        registry.register(perm("A"), None).unwrap();
        registry.register(perm("B"), Some(perm("A"))).unwrap();

        assert!(registry.register(perm("C"), Some(perm("C"))).is_err());
        // Re-parenting A under B would close a cycle
        assert!(registry.register(perm("A"), Some(perm("B"))).is_err());
        // Same registration twice is fine
        assert!(registry.register(perm("B"), Some(perm("A"))).is_ok());
    }

    #[test]
    fn test_read_permissions() {
        let mut registry = PermissionRegistry::standard();
        assert_eq!(
            registry.read_permission(RoleCategory::Global).map(Permission::id),
            Some(ids::READ)
        );
        assert_eq!(
            registry.read_permission(RoleCategory::Item).map(Permission::id),
            Some(ids::JOB_READ)
        );
        assert!(registry.read_permission(RoleCategory::Agent).is_none());

        registry
            .set_read_permission(RoleCategory::Agent, perm(ids::AGENT_CONNECT))
            .unwrap();
        assert!(registry.read_permission(RoleCategory::Agent).is_some());
        assert!(registry
            .set_read_permission(RoleCategory::Agent, perm("Agent/Fly"))
            .is_err());
    }
}
