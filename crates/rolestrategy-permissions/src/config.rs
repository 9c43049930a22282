//! Declarative role configuration
//!
//! The document shape read and written by the host's configuration importer:
//!
//! ```yaml
//! authorizationStrategy:
//!   roleBased:
//!     roles:
//!       global:
//!         - name: admin
//!           permissions: [Overall/Administer]
//!           assignments: [admin]
//!       folder:
//!         - name: folder-a
//!           pattern: "A/.*"
//!           permissions: [Job/Build]
//!           assignments: [user1]
//!       agent: []
//! projectNamingStrategy:
//!   roleBased:
//!     forceExistingJobs: false
//! ```
//!
//! Exports list roles by name, permissions and assignments sorted, and omit
//! optional keys at their defaults, so identical content always serializes
//! to identical bytes.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::{AuthorizationEngine, EngineSettings};
use crate::error::Result;
use crate::naming::NamingPolicy;
use crate::pattern::PatternCache;
use crate::permission::PermissionRegistry;
use crate::role::{RoleCategory, RoleMap};

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_strategy: Option<AuthorizationStrategyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_naming_strategy: Option<ProjectNamingStrategyConfig>,
    /// Short form of `projectNamingStrategy.roleBased.forceExistingJobs`;
    /// never written back
    #[serde(default, skip_serializing)]
    pub force_existing_jobs: Option<bool>,
}

/// `authorizationStrategy`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationStrategyConfig {
    #[serde(default)]
    pub role_based: RoleBasedConfig,
}

/// `authorizationStrategy.roleBased`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBasedConfig {
    #[serde(default)]
    pub roles: RolesConfig,
    /// Overrides the host's setting when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated_read_fallback: Option<bool>,
}

/// Role lists per category; each list may be absent or `null`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub global: Vec<RoleDefinition>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub folder: Vec<RoleDefinition>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub agent: Vec<RoleDefinition>,
}

impl RolesConfig {
    /// Definitions of one category
    pub fn category(&self, category: RoleCategory) -> &[RoleDefinition] {
        match category {
            RoleCategory::Global => &self.global,
            RoleCategory::Item => &self.folder,
            RoleCategory::Agent => &self.agent,
        }
    }

    fn category_mut(&mut self, category: RoleCategory) -> &mut Vec<RoleDefinition> {
        match category {
            RoleCategory::Global => &mut self.global,
            RoleCategory::Item => &mut self.folder,
            RoleCategory::Agent => &mut self.agent,
        }
    }
}

/// One role with its grants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub permissions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assignments: Vec<String>,
}

/// `projectNamingStrategy`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNamingStrategyConfig {
    #[serde(default)]
    pub role_based: RoleBasedNamingConfig,
}

/// `projectNamingStrategy.roleBased`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBasedNamingConfig {
    #[serde(default)]
    pub force_existing_jobs: bool,
}

impl StrategyDocument {
    /// Parse a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize to YAML in canonical order
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.canonical())?)
    }

    /// Serialize to pretty JSON in canonical order
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.canonical())?)
    }

    /// The role lists, empty when no authorization strategy is configured
    pub fn roles(&self) -> RolesConfig {
        self.authorization_strategy
            .as_ref()
            .map(|a| a.role_based.roles.clone())
            .unwrap_or_default()
    }

    /// `base` with the switches the document sets explicitly
    pub fn engine_settings(&self, base: EngineSettings) -> EngineSettings {
        EngineSettings {
            authenticated_read_fallback: self
                .authorization_strategy
                .as_ref()
                .and_then(|a| a.role_based.authenticated_read_fallback)
                .unwrap_or(base.authenticated_read_fallback),
            ..base
        }
    }

    /// The naming policy, `None` when naming is not role based
    pub fn naming_policy(&self) -> Option<NamingPolicy> {
        match (&self.project_naming_strategy, self.force_existing_jobs) {
            (Some(naming), _) => Some(NamingPolicy::new(naming.role_based.force_existing_jobs)),
            (None, Some(force)) => Some(NamingPolicy::new(force)),
            (None, None) => None,
        }
    }

    /// Validate every role and build an engine.
    ///
    /// Any invalid pattern, unknown permission, conflicting duplicate role
    /// or blank assignment rejects the whole document.
    pub fn build_engine(
        &self,
        registry: Arc<PermissionRegistry>,
        cache: Arc<PatternCache>,
        settings: EngineSettings,
    ) -> Result<AuthorizationEngine> {
        let roles = self.roles();
        let mut engine = AuthorizationEngine::new(
            Arc::clone(&registry),
            cache,
            self.engine_settings(settings),
        );

        for category in RoleCategory::ALL {
            let map = engine.role_map_mut(category);
            for definition in roles.category(category) {
                load_definition(map, definition, &registry)?;
            }
        }

        Ok(engine)
    }

    /// Capture an engine and naming policy as a document. The read fallback
    /// is written only when it is on.
    pub fn from_engine(engine: &AuthorizationEngine, naming: Option<NamingPolicy>) -> Self {
        let mut roles = RolesConfig::default();
        for category in RoleCategory::ALL {
            *roles.category_mut(category) = export_map(engine.role_map(category));
        }

        Self {
            authorization_strategy: Some(AuthorizationStrategyConfig {
                role_based: RoleBasedConfig {
                    roles,
                    authenticated_read_fallback: engine
                        .settings()
                        .authenticated_read_fallback
                        .then_some(true),
                },
            }),
            project_naming_strategy: naming.map(|policy| ProjectNamingStrategyConfig {
                role_based: RoleBasedNamingConfig {
                    force_existing_jobs: policy.force_existing_jobs,
                },
            }),
            force_existing_jobs: None,
        }
    }

    /// A copy with roles sorted by name and every list sorted and
    /// deduplicated, the naming short form moved to its full key
    pub fn canonical(&self) -> Self {
        let mut document = self.clone();
        if let Some(force) = document.force_existing_jobs.take() {
            document
                .project_naming_strategy
                .get_or_insert_with(|| ProjectNamingStrategyConfig {
                    role_based: RoleBasedNamingConfig {
                        force_existing_jobs: force,
                    },
                });
        }
        if let Some(strategy) = document.authorization_strategy.as_mut() {
            for category in RoleCategory::ALL {
                let definitions = strategy.role_based.roles.category_mut(category);
                for definition in definitions.iter_mut() {
                    definition.permissions.sort();
                    definition.permissions.dedup();
                    definition.assignments.sort();
                    definition.assignments.dedup();
                }
                definitions.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        document
    }
}

fn load_definition(
    map: &mut RoleMap,
    definition: &RoleDefinition,
    registry: &PermissionRegistry,
) -> Result<()> {
    map.define_role(
        &definition.name,
        definition.pattern.as_deref(),
        definition.permissions.iter().map(String::as_str),
        definition.description.as_deref(),
        registry,
    )?;
    for sid in &definition.assignments {
        map.assign_role(&definition.name, sid)?;
    }
    Ok(())
}

fn export_map(map: &RoleMap) -> Vec<RoleDefinition> {
    map.granted_roles()
        .map(|(role, sids)| RoleDefinition {
            name: role.name().to_string(),
            description: role.description().map(str::to_string),
            pattern: role.pattern().source().map(str::to_string),
            permissions: role.permissions().iter().map(|p| p.id().to_string()).collect(),
            assignments: sids.iter().cloned().collect(),
        })
        .collect()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
