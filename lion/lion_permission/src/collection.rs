//! Permission collections.
//!
//! This module provides a thread-safe heterogeneous collection of
//! permissions and the `PermissionSet` trait shared with read-only views.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lion_core::error::PermissionError;
use parking_lot::RwLock;

use crate::model::{AllPermission, Permission};

/// A set of permissions that answers point queries.
pub trait PermissionSet: Send + Sync {
    /// Checks if the set grants `permission`.
    fn implies(&self, permission: &dyn Permission) -> bool;

    /// Adds a permission to the set.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the permission was added.
    /// * `Err(PermissionError::ReadOnly)` - If the set does not accept additions.
    fn add(&self, permission: Arc<dyn Permission>) -> Result<(), PermissionError>;

    /// Lists the permissions in the set, where the set can be enumerated.
    fn elements(&self) -> Result<Vec<Arc<dyn Permission>>, PermissionError>;
}

#[derive(Default)]
struct Inner {
    /// Permissions grouped by type, in insertion order.
    by_type: HashMap<String, Vec<Arc<dyn Permission>>>,

    /// Set once an `AllPermission` has been added.
    all: bool,

    len: usize,
}

/// A thread-safe, heterogeneous permission collection.
///
/// Additions and queries may happen concurrently; a collection can be
/// frozen with `set_read_only`.
#[derive(Default)]
pub struct Permissions {
    inner: RwLock<Inner>,
    read_only: AtomicBool,
}

impl Permissions {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from permissions.
    pub fn from_permissions(permissions: impl IntoIterator<Item = Arc<dyn Permission>>) -> Self {
        let collection = Self::new();
        {
            let mut inner = collection.inner.write();
            for permission in permissions {
                Self::insert(&mut inner, permission);
            }
        }
        collection
    }

    /// Freeze the collection. Further additions fail.
    pub fn set_read_only(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy every permission of `other` into this collection.
    pub fn extend_from(&self, other: &Permissions) -> Result<usize, PermissionError> {
        let elements = other.snapshot();
        let count = elements.len();
        for permission in elements {
            self.add(permission)?;
        }
        Ok(count)
    }

    fn snapshot(&self) -> Vec<Arc<dyn Permission>> {
        let inner = self.inner.read();
        inner.by_type.values().flatten().cloned().collect()
    }

    fn insert(inner: &mut Inner, permission: Arc<dyn Permission>) {
        if permission.permission_type() == AllPermission::TYPE {
            inner.all = true;
        }
        inner
            .by_type
            .entry(permission.permission_type().to_string())
            .or_default()
            .push(permission);
        inner.len += 1;
    }
}

impl PermissionSet for Permissions {
    fn implies(&self, permission: &dyn Permission) -> bool {
        let inner = self.inner.read();
        if inner.all {
            return true;
        }
        inner
            .by_type
            .get(permission.permission_type())
            .map(|candidates| candidates.iter().any(|held| held.implies(permission)))
            .unwrap_or(false)
    }

    fn add(&self, permission: Arc<dyn Permission>) -> Result<(), PermissionError> {
        if self.is_read_only() {
            return Err(PermissionError::ReadOnly);
        }
        Self::insert(&mut self.inner.write(), permission);
        Ok(())
    }

    fn elements(&self) -> Result<Vec<Arc<dyn Permission>>, PermissionError> {
        Ok(self.snapshot())
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Permissions")
            .field("len", &inner.len)
            .field("all", &inner.all)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilePermission, NamedPermission};

    fn file(name: &str, actions: &str) -> Arc<dyn Permission> {
        Arc::new(FilePermission::new(name, actions).unwrap())
    }

    fn property(name: &str, actions: &str) -> Arc<dyn Permission> {
        Arc::new(NamedPermission::new("property", name, actions).unwrap())
    }

    #[test]
    fn test_empty_collection() {
        let perms = Permissions::new();
        assert!(perms.is_empty());
        assert!(!perms.implies(file("/tmp/a", "read").as_ref()));
    }

    #[test]
    fn test_implies_by_type() {
        let perms = Permissions::from_permissions(vec![file("/tmp/-", "read"), property("a.*", "read")]);
        assert_eq!(perms.len(), 2);
        assert!(perms.implies(file("/tmp/x", "read").as_ref()));
        assert!(perms.implies(property("a.b", "read").as_ref()));
        assert!(!perms.implies(property("b", "read").as_ref()));
        assert!(!perms.implies(file("/tmp/x", "write").as_ref()));
    }

    #[test]
    fn test_all_permission_short_circuits() {
        let perms = Permissions::new();
        perms.add(Arc::new(AllPermission)).unwrap();
        assert!(perms.implies(file("/etc/shadow", "write").as_ref()));
        assert!(perms.implies(property("anything", "read").as_ref()));
    }

    #[test]
    fn test_read_only() {
        let perms = Permissions::new();
        perms.add(file("/tmp/a", "read")).unwrap();
        perms.set_read_only();
        assert_eq!(perms.add(file("/tmp/b", "read")), Err(PermissionError::ReadOnly));
        assert_eq!(perms.elements().unwrap().len(), 1);
    }

    #[test]
    fn test_extend_from() {
        let source = Permissions::from_permissions(vec![file("/a", "read"), file("/b", "read")]);
        let target = Permissions::new();
        assert_eq!(target.extend_from(&source).unwrap(), 2);
        assert!(target.implies(file("/b", "read").as_ref()));
    }
}
