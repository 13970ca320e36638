//! Administrator-assigned permissions.

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::model::PermissionRecord;

/// Default and per-location assigned permissions.
///
/// A location override replaces the default entirely for that bundle.
#[derive(Debug, Default)]
pub struct AssignedPermissions {
    /// Assignment for bundles without an override.
    default: RwLock<Option<Vec<PermissionRecord>>>,

    /// Overrides keyed by bundle location.
    locations: DashMap<String, Vec<PermissionRecord>>,
}

impl AssignedPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_permissions(&self) -> Option<Vec<PermissionRecord>> {
        self.default.read().clone()
    }

    pub fn set_default_permissions(&self, records: Option<Vec<PermissionRecord>>) {
        *self.default.write() = records;
    }

    pub fn location_permissions(&self, location: &str) -> Option<Vec<PermissionRecord>> {
        self.locations.get(location).map(|records| records.value().clone())
    }

    /// Set or, with `None`, remove the override for `location`.
    pub fn set_location_permissions(&self, location: impl Into<String>, records: Option<Vec<PermissionRecord>>) {
        let location = location.into();
        match records {
            Some(records) => {
                self.locations.insert(location, records);
            }
            None => {
                self.locations.remove(&location);
            }
        }
    }

    /// Locations with an override, sorted.
    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = self.locations.iter().map(|e| e.key().clone()).collect();
        locations.sort();
        locations
    }

    /// The assignment that applies to a bundle at `location`.
    ///
    /// # Returns
    ///
    /// * `Some((records, false))` - A location override.
    /// * `Some((records, true))` - The default assignment.
    /// * `None` - Nothing is assigned.
    pub fn lookup(&self, location: &str) -> Option<(Vec<PermissionRecord>, bool)> {
        if let Some(records) = self.location_permissions(location) {
            return Some((records, false));
        }
        self.default_permissions().map(|records| (records, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(name: &str) -> Vec<PermissionRecord> {
        vec![PermissionRecord::new("property", name, "read")]
    }

    #[test]
    fn test_lookup_precedence() {
        let assigned = AssignedPermissions::new();
        assert_eq!(assigned.lookup("file:/a.jar"), None);

        assigned.set_default_permissions(Some(records("d")));
        assert_eq!(assigned.lookup("file:/a.jar"), Some((records("d"), true)));

        assigned.set_location_permissions("file:/a.jar", Some(vec![]));
        assert_eq!(assigned.lookup("file:/a.jar"), Some((vec![], false)));
        assert_eq!(assigned.lookup("file:/b.jar"), Some((records("d"), true)));
        assert_eq!(assigned.locations(), vec!["file:/a.jar".to_string()]);

        assigned.set_location_permissions("file:/a.jar", None);
        assert_eq!(assigned.lookup("file:/a.jar"), Some((records("d"), true)));
    }
}
