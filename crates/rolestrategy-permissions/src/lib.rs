//! Role-based authorization strategy
//!
//! Roles bundle permissions and apply to resources whose names match an
//! anchored regular expression. Roles live in three maps (global, item and
//! agent) and are granted to users and groups. Item checks walk the folder
//! hierarchy, global grants apply everywhere, and an optional naming policy
//! restricts the names identities may give new items.

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod naming;
pub mod pattern;
pub mod permission;
pub mod resource;
pub mod role;
pub mod session;
pub mod storage;
pub mod strategy;

pub use config::{RoleDefinition, RolesConfig, StrategyDocument};
pub use engine::{AuthorizationEngine, EngineSettings};
pub use error::{Error, NameRejection, Result};
pub use identity::{Identity, ANONYMOUS, AUTHENTICATED};
pub use naming::{NameCheck, NamingPolicy};
pub use pattern::{PatternCache, PatternMatcher};
pub use permission::{Permission, PermissionRegistry};
pub use resource::Resource;
pub use role::{Role, RoleCategory, RoleMap};
pub use session::{current, impersonate, with_identity, ImpersonationGuard};
pub use storage::{
    DocumentFormat, FileRoleStrategyRepository, InMemoryRoleStrategyRepository,
    RoleStrategyRepository,
};
pub use strategy::{RoleStrategy, Snapshot};
