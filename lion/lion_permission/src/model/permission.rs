//! Core permission trait.
//!
//! This module defines the core `Permission` trait that is implemented by
//! all specific permission types.

use std::any::Any;
use std::fmt::Debug;

/// Core permission trait.
///
/// A permission is an immutable, typed grant. Permissions never change after
/// construction, so they are shared as `Arc<dyn Permission>`.
pub trait Permission: Debug + Send + Sync {
    /// Returns the type of this permission, e.g. `file`.
    fn permission_type(&self) -> &str;

    /// Returns the target name of this permission.
    fn name(&self) -> &str;

    /// Returns the canonical action list, comma separated.
    fn actions(&self) -> &str;

    /// Checks if holding this permission is sufficient for `other`.
    ///
    /// # Arguments
    ///
    /// * `other` - The permission being requested.
    ///
    /// # Returns
    ///
    /// `true` if this permission implies `other`, `false` otherwise.
    fn implies(&self, other: &dyn Permission) -> bool;

    /// Upcast used by implementations to compare against their own type.
    fn as_any(&self) -> &dyn Any;
}

/// Split a comma separated action list into trimmed, lowercase actions.
pub(crate) fn split_actions(actions: &str) -> impl Iterator<Item = String> + '_ {
    actions
        .split(',')
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| !a.is_empty())
}
