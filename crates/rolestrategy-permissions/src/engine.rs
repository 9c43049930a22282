//! Permission decisions over the three role maps

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identity::Identity;
use crate::pattern::{PatternCache, DEFAULT_CACHE_CAPACITY};
use crate::permission::{Permission, PermissionRegistry};
use crate::resource::Resource;
use crate::role::{Role, RoleCategory, RoleMap};

/// Engine-wide switches supplied by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Grant the category's read permission to authenticated identities
    /// when no role of that category matches the resource
    #[serde(default)]
    pub authenticated_read_fallback: bool,
    /// Upper bound on cached compiled patterns
    #[serde(default = "default_cache_capacity")]
    pub pattern_cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            authenticated_read_fallback: false,
            pattern_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// One role map per category plus the permission model they are read with.
///
/// An engine is built once per configuration and never mutated while
/// checks run against it; see [`crate::RoleStrategy`] for the swap.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    registry: Arc<PermissionRegistry>,
    global: RoleMap,
    items: RoleMap,
    agents: RoleMap,
    settings: EngineSettings,
}

impl AuthorizationEngine {
    /// Create an engine without roles
    pub fn new(
        registry: Arc<PermissionRegistry>,
        cache: Arc<PatternCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            global: RoleMap::new(RoleCategory::Global, Arc::clone(&cache)),
            items: RoleMap::new(RoleCategory::Item, Arc::clone(&cache)),
            agents: RoleMap::new(RoleCategory::Agent, cache),
            settings,
        }
    }

    /// The permission model
    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Shared handle to the permission model
    pub fn registry_handle(&self) -> Arc<PermissionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Engine switches
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Change the engine switches
    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.settings = settings;
    }

    /// The role map of a category
    pub fn role_map(&self, category: RoleCategory) -> &RoleMap {
        match category {
            RoleCategory::Global => &self.global,
            RoleCategory::Item => &self.items,
            RoleCategory::Agent => &self.agents,
        }
    }

    /// Mutable role map of a category, for building an engine
    pub fn role_map_mut(&mut self, category: RoleCategory) -> &mut RoleMap {
        match category {
            RoleCategory::Global => &mut self.global,
            RoleCategory::Item => &mut self.items,
            RoleCategory::Agent => &mut self.agents,
        }
    }

    /// Roles of a category with their assignments, in role-name order
    pub fn granted_roles(
        &self,
        category: RoleCategory,
    ) -> impl Iterator<Item = (&Role, &BTreeSet<String>)> {
        self.role_map(category).granted_roles()
    }

    /// Decide whether `identity` holds `permission` on `resource`.
    ///
    /// Items are evaluated against their own name and then each ancestor,
    /// agents against their name; both also accept any global grant. The
    /// decision is the OR of every evaluation. Unknown resources simply
    /// match no pattern.
    pub fn has_permission(
        &self,
        identity: &Identity,
        resource: &Resource,
        permission: &Permission,
    ) -> bool {
        let sids = identity.sids();
        let category = resource.category();

        let granted = match resource {
            Resource::Global => self.global_grants(&sids, permission),
            Resource::Item { .. } | Resource::Agent { .. } => {
                let map = self.role_map(category);
                resource
                    .candidates()
                    .into_iter()
                    .any(|name| map.has_permission(&sids, Some(name), permission, &self.registry))
                    || self.global_grants(&sids, permission)
            }
        };

        if granted {
            debug!(
                identity = %identity.name,
                resource = ?resource.name(),
                permission = %permission,
                %category,
                "permission granted"
            );
            return true;
        }

        if self.read_fallback_applies(identity, resource, permission) {
            debug!(
                identity = %identity.name,
                resource = ?resource.name(),
                permission = %permission,
                %category,
                "permission granted by authenticated read fallback"
            );
            return true;
        }

        debug!(
            identity = %identity.name,
            resource = ?resource.name(),
            permission = %permission,
            %category,
            "permission denied"
        );
        false
    }

    /// Every registered permission `identity` holds on `resource`
    pub fn effective_permissions(
        &self,
        identity: &Identity,
        resource: &Resource,
    ) -> BTreeSet<Permission> {
        self.registry
            .permissions()
            .filter(|permission| self.has_permission(identity, resource, permission))
            .cloned()
            .collect()
    }

    fn global_grants(&self, sids: &BTreeSet<&str>, permission: &Permission) -> bool {
        self.global.has_permission(sids, None, permission, &self.registry)
    }

    /// The fallback only fires for authenticated identities, only for
    /// permissions implied by the category's read permission, and only when
    /// no role of the category applies to the resource at all.
    fn read_fallback_applies(
        &self,
        identity: &Identity,
        resource: &Resource,
        permission: &Permission,
    ) -> bool {
        if !self.settings.authenticated_read_fallback || identity.is_anonymous() {
            return false;
        }

        let category = resource.category();
        let Some(read) = self.registry.read_permission(category) else {
            return false;
        };
        if !self.registry.implies(read, permission) {
            return false;
        }

        let map = self.role_map(category);
        match resource {
            Resource::Global => map.is_empty(),
            _ => !resource
                .candidates()
                .into_iter()
                .any(|name| map.has_matching_role(name)),
        }
    }
}
