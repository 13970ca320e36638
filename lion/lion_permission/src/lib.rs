//! # Lion Permission
//!
//! `lion_permission` provides the permission model used by the Lion
//! permission engine. A permission is a typed, named grant with a set of
//! actions; one permission *implies* another when holding the first is
//! sufficient to perform what the second describes.
//!
//! Key concepts:
//!
//! 1. **Permission**: A typed grant such as `(file "/tmp/-" "read")`.
//!
//! 2. **Collection**: A thread-safe bag of permissions answering point
//!    queries with `implies`.
//!
//! 3. **Factory**: A registered-constructor table turning a
//!    `(type, name, actions)` triple into a concrete permission.

pub mod collection;
pub mod factory;
pub mod model;

// Re-export key types and traits for convenience
pub use collection::{PermissionSet, Permissions};
pub use factory::{Arity, PermissionConstructor, PermissionFactory};
pub use model::{AllPermission, FilePermission, NamedPermission, Permission, ALL_FILES};
