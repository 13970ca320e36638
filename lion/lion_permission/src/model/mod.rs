//! Permission models.
//!
//! This module defines the core permission trait and the built-in
//! permission types.

pub mod all;
pub mod file;
pub mod named;
pub mod permission;

pub use all::AllPermission;
pub use file::{FilePermission, ALL_FILES};
pub use named::NamedPermission;
pub use permission::Permission;
