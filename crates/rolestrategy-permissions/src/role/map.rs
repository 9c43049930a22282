//! Per-category table of roles and the SIDs granted each role

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pattern::PatternCache;
use crate::permission::{Permission, PermissionRegistry};
use crate::role::models::{Role, RoleCategory};

#[derive(Debug, Clone)]
struct RoleEntry {
    role: Role,
    sids: BTreeSet<String>,
}

/// Roles of one category and their assignments.
///
/// Iteration is always in role-name order, so exports are reproducible
/// regardless of the order roles were added in.
#[derive(Debug, Clone)]
pub struct RoleMap {
    category: RoleCategory,
    cache: Arc<PatternCache>,
    roles: BTreeMap<String, RoleEntry>,
}

impl RoleMap {
    /// Create an empty map compiling patterns through `cache`
    pub fn new(category: RoleCategory, cache: Arc<PatternCache>) -> Self {
        Self {
            category,
            cache,
            roles: BTreeMap::new(),
        }
    }

    /// The category of every role in this map
    pub fn category(&self) -> RoleCategory {
        self.category
    }

    /// Compile and validate a role definition, then add it.
    ///
    /// Fails on an invalid pattern, on a permission the registry does not
    /// know, and on a name already taken by a different role.
    pub fn define_role<'a, I>(
        &mut self,
        name: &str,
        pattern: Option<&str>,
        permissions: I,
        description: Option<&str>,
        registry: &PermissionRegistry,
    ) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let compiled = self
            .cache
            .compile(pattern)
            .map_err(|source| Error::InvalidPattern {
                role: name.to_string(),
                pattern: pattern.unwrap_or_default().to_string(),
                source,
            })?;

        let permissions = permissions
            .into_iter()
            .map(|id| {
                registry
                    .lookup(id)
                    .cloned()
                    .ok_or_else(|| Error::UnknownPermission {
                        role: name.to_string(),
                        permission: id.to_string(),
                    })
            })
            .collect::<Result<Vec<Permission>>>()?;

        let mut role = Role::new(name, compiled, permissions);
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            role = role.with_description(description);
        }
        self.add_role(role)
    }

    /// Add a prebuilt role. Adding an identical role again is a no-op.
    pub fn add_role(&mut self, role: Role) -> Result<()> {
        match self.roles.get(role.name()) {
            Some(existing) if existing.role == role => Ok(()),
            Some(_) => Err(Error::DuplicateRole {
                category: self.category,
                role: role.name().to_string(),
            }),
            None => {
                self.roles.insert(
                    role.name().to_string(),
                    RoleEntry {
                        role,
                        sids: BTreeSet::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Grant a role to a user or group
    pub fn assign_role(&mut self, role: &str, sid: &str) -> Result<()> {
        let sid = sid.trim();
        if sid.is_empty() {
            return Err(Error::InvalidAssignment {
                role: role.to_string(),
                identity: sid.to_string(),
            });
        }
        let category = self.category;
        let entry = self.roles.get_mut(role).ok_or_else(|| Error::UnknownRole {
            category,
            role: role.to_string(),
        })?;
        entry.sids.insert(sid.to_string());
        Ok(())
    }

    /// Revoke a role from a SID, returning whether it was granted
    pub fn unassign_role(&mut self, role: &str, sid: &str) -> bool {
        self.roles
            .get_mut(role)
            .map(|entry| entry.sids.remove(sid))
            .unwrap_or(false)
    }

    /// Revoke every role from a SID
    pub fn delete_sid(&mut self, sid: &str) {
        for entry in self.roles.values_mut() {
            entry.sids.remove(sid);
        }
    }

    /// Remove a role together with its assignments
    pub fn remove_role(&mut self, name: &str) -> Option<Role> {
        self.roles.remove(name).map(|entry| entry.role)
    }

    /// Look up a role by name
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name).map(|entry| &entry.role)
    }

    /// SIDs granted a role
    pub fn sids_for_role(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.roles.get(name).map(|entry| &entry.sids)
    }

    /// Roles granted directly to a SID
    pub fn roles_for_sid<'a>(&'a self, sid: &'a str) -> impl Iterator<Item = &'a Role> + 'a {
        self.roles
            .values()
            .filter(move |entry| entry.sids.contains(sid))
            .map(|entry| &entry.role)
    }

    /// Roles granted to any of the given SIDs
    pub fn roles_granted_to<'a>(
        &'a self,
        sids: &'a BTreeSet<&'a str>,
    ) -> impl Iterator<Item = &'a Role> + 'a {
        self.roles
            .values()
            .filter(move |entry| is_granted(entry, sids))
            .map(|entry| &entry.role)
    }

    /// Every SID holding at least one role
    pub fn sids(&self) -> BTreeSet<&str> {
        self.roles
            .values()
            .flat_map(|entry| entry.sids.iter().map(String::as_str))
            .collect()
    }

    /// Roles whose pattern matches a resource name
    pub fn matching_roles<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Role> + 'a {
        self.roles
            .values()
            .map(|entry| &entry.role)
            .filter(move |role| role.matches(name))
    }

    /// Check whether any role pattern matches a resource name
    pub fn has_matching_role(&self, name: &str) -> bool {
        self.matching_roles(name).next().is_some()
    }

    /// A map restricted to the roles whose pattern matches `name`, keeping
    /// their assignments
    pub fn new_matching_role_map(&self, name: &str) -> RoleMap {
        RoleMap {
            category: self.category,
            cache: Arc::clone(&self.cache),
            roles: self
                .roles
                .iter()
                .filter(|(_, entry)| entry.role.matches(name))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
        }
    }

    /// Every role with its assignments, in role-name order
    pub fn granted_roles(&self) -> impl Iterator<Item = (&Role, &BTreeSet<String>)> {
        self.roles.values().map(|entry| (&entry.role, &entry.sids))
    }

    /// Number of roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if the map holds no roles
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Decide a permission for a set of SIDs.
    ///
    /// With no resource name every role is considered and patterns are
    /// ignored; otherwise only roles whose pattern matches the name. The
    /// result is the OR over considered roles that both imply `permission`
    /// and are granted to one of `sids`. There is no deny role.
    pub fn has_permission(
        &self,
        sids: &BTreeSet<&str>,
        resource_name: Option<&str>,
        permission: &Permission,
        registry: &PermissionRegistry,
    ) -> bool {
        self.roles.values().any(|entry| {
            let in_scope = match resource_name {
                None => true,
                Some(name) => entry.role.matches(name),
            };
            in_scope && entry.role.has_permission(permission, registry) && is_granted(entry, sids)
        })
    }
}

fn is_granted(entry: &RoleEntry, sids: &BTreeSet<&str>) -> bool {
    entry.sids.iter().any(|sid| sids.contains(sid.as_str()))
}
