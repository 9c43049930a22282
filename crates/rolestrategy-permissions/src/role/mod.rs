//! Roles and the per-category maps granting them

pub mod map;
pub mod models;

pub use map::RoleMap;
pub use models::{Role, RoleCategory};
