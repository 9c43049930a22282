//! Permission identifiers and the implication table supplied by the host

pub mod models;
pub mod registry;

pub use models::Permission;
pub use registry::PermissionRegistry;
