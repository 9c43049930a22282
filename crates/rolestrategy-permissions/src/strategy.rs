//! Live role strategy with atomic configuration swaps
//!
//! Checks run against an immutable [`Snapshot`]. Loading or editing builds a
//! complete replacement off to the side and swaps it in only once it has been
//! validated, so a check observes either the old configuration or the new
//! one and a rejected document leaves the active one untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::StrategyDocument;
use crate::engine::{AuthorizationEngine, EngineSettings};
use crate::error::{NameRejection, Result};
use crate::identity::Identity;
use crate::naming::{NameCheck, NamingPolicy};
use crate::pattern::PatternCache;
use crate::permission::{Permission, PermissionRegistry};
use crate::resource::Resource;
use crate::role::{Role, RoleCategory};
use crate::session;
use crate::storage::RoleStrategyRepository;

/// One complete, validated configuration
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub engine: AuthorizationEngine,
    /// `None` when names are not checked
    pub naming: Option<NamingPolicy>,
}

impl Snapshot {
    fn role_counts(&self) -> [usize; 3] {
        RoleCategory::ALL.map(|category| self.engine.role_map(category).len())
    }
}

/// The active authorization strategy
pub struct RoleStrategy {
    registry: Arc<PermissionRegistry>,
    cache: Arc<PatternCache>,
    settings: EngineSettings,
    active: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl RoleStrategy {
    /// Create a strategy without roles; every check is denied until a
    /// configuration is loaded
    pub fn new(registry: Arc<PermissionRegistry>, settings: EngineSettings) -> Self {
        let cache = Arc::new(PatternCache::with_capacity(settings.pattern_cache_capacity));
        let engine = AuthorizationEngine::new(Arc::clone(&registry), Arc::clone(&cache), settings);
        Self {
            registry,
            cache,
            settings,
            active: RwLock::new(Arc::new(Snapshot { engine, naming: None })),
            writer: Mutex::new(()),
        }
    }

    /// Create a strategy over the standard permission catalogue
    pub fn with_standard_permissions() -> Self {
        Self::new(Arc::new(PermissionRegistry::standard()), EngineSettings::default())
    }

    /// Create a strategy and load `document` into it
    pub fn from_document(
        registry: Arc<PermissionRegistry>,
        settings: EngineSettings,
        document: &StrategyDocument,
    ) -> Result<Self> {
        let strategy = Self::new(registry, settings);
        strategy.load(document)?;
        Ok(strategy)
    }

    /// The permission model
    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Validate `document` completely and make it the active configuration
    pub fn load(&self, document: &StrategyDocument) -> Result<()> {
        let _writer = self.writer.lock();
        let snapshot = match self.build(document) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "rejected role strategy configuration, keeping the active one");
                return Err(err);
            }
        };
        self.swap(snapshot);
        Ok(())
    }

    /// Load the configuration currently stored in `repository`
    pub fn reload(&self, repository: &dyn RoleStrategyRepository) -> Result<()> {
        let document = match repository.load_document() {
            Ok(document) => document,
            Err(err) => {
                warn!(
                    error = %err,
                    "failed to read role strategy configuration, keeping the active one"
                );
                return Err(err);
            }
        };
        self.load(&document)
    }

    /// The active configuration. Holding the snapshot keeps it alive across
    /// later swaps.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.active.read().clone()
    }

    /// The active configuration as a document. The read fallback is written
    /// explicitly whenever it differs from this strategy's own settings.
    pub fn export(&self) -> StrategyDocument {
        let snapshot = self.snapshot();
        let mut document = StrategyDocument::from_engine(&snapshot.engine, snapshot.naming);
        let fallback = snapshot.engine.settings().authenticated_read_fallback;
        if fallback != self.settings.authenticated_read_fallback {
            if let Some(strategy) = document.authorization_strategy.as_mut() {
                strategy.role_based.authenticated_read_fallback = Some(fallback);
            }
        }
        document
    }

    /// Write the active configuration to `repository`
    pub fn save(&self, repository: &dyn RoleStrategyRepository) -> Result<()> {
        repository.save_document(&self.export())
    }

    /// Edit a copy of the active configuration and swap it in once `edit`
    /// succeeds. A failing edit leaves the active configuration unchanged.
    pub fn modify<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Snapshot, &PermissionRegistry) -> Result<()>,
    {
        let _writer = self.writer.lock();
        let mut draft = Snapshot::clone(&self.snapshot());
        if let Err(err) = edit(&mut draft, &self.registry) {
            warn!(error = %err, "rejected role strategy edit, keeping the active one");
            return Err(err);
        }
        self.swap(draft);
        Ok(())
    }

    /// Decide a permission for an explicit identity
    pub fn has_permission(
        &self,
        identity: &Identity,
        resource: &Resource,
        permission: &Permission,
    ) -> bool {
        self.snapshot().engine.has_permission(identity, resource, permission)
    }

    /// Decide a permission for the identity acting on this thread
    pub fn has_permission_as_current(&self, resource: &Resource, permission: &Permission) -> bool {
        self.has_permission(&session::current(), resource, permission)
    }

    /// Roles of a category with their assignments, in role-name order
    pub fn granted_roles(&self, category: RoleCategory) -> Vec<(Role, BTreeSet<String>)> {
        self.snapshot()
            .engine
            .granted_roles(category)
            .map(|(role, sids)| (role.clone(), sids.clone()))
            .collect()
    }

    /// The naming policy, `None` when names are not checked
    pub fn naming_policy(&self) -> Option<NamingPolicy> {
        self.snapshot().naming
    }

    /// Validate an item name proposed by `identity`
    pub fn check_name(
        &self,
        identity: &Identity,
        parent: Option<&Resource>,
        name: &str,
        check: &NameCheck,
    ) -> std::result::Result<(), NameRejection> {
        let snapshot = self.snapshot();
        match snapshot.naming {
            Some(policy) => policy.validate(&snapshot.engine, identity, parent, name, check),
            None => Ok(()),
        }
    }

    /// Validate an item name proposed by the identity acting on this thread
    pub fn check_name_as_current(
        &self,
        parent: Option<&Resource>,
        name: &str,
        check: &NameCheck,
    ) -> std::result::Result<(), NameRejection> {
        self.check_name(&session::current(), parent, name, check)
    }

    fn build(&self, document: &StrategyDocument) -> Result<Snapshot> {
        let engine = document.build_engine(
            Arc::clone(&self.registry),
            Arc::clone(&self.cache),
            self.settings,
        )?;
        Ok(Snapshot {
            engine,
            naming: document.naming_policy(),
        })
    }

    fn swap(&self, snapshot: Snapshot) {
        let [global, items, agents] = snapshot.role_counts();
        let naming = snapshot.naming.is_some();
        *self.active.write() = Arc::new(snapshot);
        info!(global, items, agents, naming, "role strategy configuration activated");
    }
}

impl std::fmt::Debug for RoleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleStrategy")
            .field("settings", &self.settings)
            .field("active", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::permission::registry::ids;
    use crate::storage::InMemoryRoleStrategyRepository;

    const CONFIG: &str = r#"
authorizationStrategy:
  roleBased:
    roles:
      global:
        - name: admin
          permissions: [Overall/Administer]
          assignments: [admin]
      folder:
        - name: creators
          pattern: "proj_.*"
          permissions: [Job/Create, Job/Read]
          assignments: [dev]
projectNamingStrategy:
  roleBased:
    forceExistingJobs: false
"#;

    fn strategy() -> RoleStrategy {
        let strategy = RoleStrategy::with_standard_permissions();
        strategy
            .load(&StrategyDocument::from_yaml_str(CONFIG).unwrap())
            .unwrap();
        strategy
    }

    #[test]
    fn test_empty_strategy_denies() {
        let strategy = RoleStrategy::with_standard_permissions();
        assert!(!strategy.has_permission(
            &Identity::user("admin"),
            &Resource::Global,
            &Permission::new(ids::READ)
        ));
        assert!(strategy.naming_policy().is_none());
    }

    #[test]
    fn test_load_and_check() {
        let strategy = strategy();
        let dev = Identity::user("dev");
        assert!(strategy.has_permission(
            &dev,
            &Resource::item("proj_a"),
            &Permission::new(ids::JOB_READ)
        ));
        assert!(!strategy.has_permission(
            &dev,
            &Resource::item("other"),
            &Permission::new(ids::JOB_READ)
        ));
        assert_eq!(strategy.granted_roles(RoleCategory::Global).len(), 1);
    }

    #[test]
    fn test_failed_load_keeps_active_configuration() {
        let strategy = strategy();
        let before = strategy.export();

        let broken = CONFIG.replace("proj_.*", "proj_[");
        let err = strategy
            .load(&StrategyDocument::from_yaml_str(&broken).unwrap())
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(strategy.export(), before);
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let strategy = strategy();
        let held = strategy.snapshot();
        strategy.load(&StrategyDocument::default()).unwrap();
        assert_eq!(held.engine.role_map(RoleCategory::Global).len(), 1);
        assert!(strategy.snapshot().engine.role_map(RoleCategory::Global).is_empty());
    }

    #[test]
    fn test_modify_is_copy_on_write() {
        let strategy = strategy();
        let held = strategy.snapshot();

        strategy
            .modify(|draft, _| {
                draft
                    .engine
                    .role_map_mut(RoleCategory::Global)
                    .assign_role("admin", "ops")
            })
            .unwrap();
        let ops = Identity::user("ops");
        assert!(strategy.has_permission(
            &ops,
            &Resource::Global,
            &Permission::new(ids::ADMINISTER)
        ));
        assert!(!held.engine.has_permission(
            &ops,
            &Resource::Global,
            &Permission::new(ids::ADMINISTER)
        ));

        let err = strategy
            .modify(|draft, registry| {
                let items = draft.engine.role_map_mut(RoleCategory::Item);
                items.assign_role("creators", "intruder")?;
                items.define_role("broken", Some("(["), [ids::JOB_READ], None, registry)
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
        let sids = strategy
            .snapshot()
            .engine
            .role_map(RoleCategory::Item)
            .sids_for_role("creators")
            .cloned()
            .unwrap();
        assert!(!sids.contains("intruder"));
    }

    #[test]
    fn test_current_identity_checks() {
        let strategy = strategy();
        let resource = Resource::item("proj_a");
        let read = Permission::new(ids::JOB_READ);
        assert!(!strategy.has_permission_as_current(&resource, &read));

        let _guard = session::impersonate(Identity::user("dev"));
        assert!(strategy.has_permission_as_current(&resource, &read));
        assert!(strategy
            .check_name_as_current(None, "proj_new", &NameCheck::Create)
            .is_ok());
        assert!(strategy
            .check_name_as_current(None, "misc", &NameCheck::Create)
            .is_err());
    }

    #[test]
    fn test_naming_disabled_accepts_everything() {
        let strategy = RoleStrategy::with_standard_permissions();
        let without_naming = CONFIG.split("projectNamingStrategy").next().unwrap();
        strategy
            .load(&StrategyDocument::from_yaml_str(without_naming).unwrap())
            .unwrap();
        assert!(strategy
            .check_name(&Identity::user("dev"), None, "misc", &NameCheck::Create)
            .is_ok());
    }

    #[test]
    fn test_configured_read_fallback_survives_load() {
        let settings = EngineSettings {
            authenticated_read_fallback: true,
            ..EngineSettings::default()
        };
        let strategy = RoleStrategy::new(Arc::new(PermissionRegistry::standard()), settings);
        strategy
            .load(&StrategyDocument::from_yaml_str(CONFIG).unwrap())
            .unwrap();
        assert!(strategy.snapshot().engine.settings().authenticated_read_fallback);

        let unmatched = Resource::item("unrelated");
        let read = Permission::new(ids::JOB_READ);
        assert!(strategy.has_permission(&Identity::user("dev"), &unmatched, &read));
        assert!(!strategy.has_permission(&Identity::anonymous(), &unmatched, &read));

        // An explicit key in the document wins over the strategy's settings
        let disabled = CONFIG.replace(
            "    roles:\n",
            "    authenticatedReadFallback: false\n    roles:\n",
        );
        strategy
            .load(&StrategyDocument::from_yaml_str(&disabled).unwrap())
            .unwrap();
        assert!(!strategy.has_permission(&Identity::user("dev"), &unmatched, &read));

        let repository = InMemoryRoleStrategyRepository::new();
        strategy.save(&repository).unwrap();
        let fresh = RoleStrategy::new(Arc::new(PermissionRegistry::standard()), settings);
        fresh.reload(&repository).unwrap();
        assert!(!fresh.snapshot().engine.settings().authenticated_read_fallback);
    }

    #[test]
    fn test_reload_and_save_through_repository() {
        let strategy = strategy();
        let repository = InMemoryRoleStrategyRepository::new();
        strategy.save(&repository).unwrap();

        let fresh = RoleStrategy::with_standard_permissions();
        fresh.reload(&repository).unwrap();
        assert_eq!(fresh.export(), strategy.export());
    }
}
