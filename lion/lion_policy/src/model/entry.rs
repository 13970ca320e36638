//! Policy entries.
//!
//! An entry is an optionally named list of condition and permission records.
//! Its permissions apply to a bundle when every condition holds for it.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use lion_core::error::{ConstructionError, FormatError, PolicyError};
use lion_core::Bundle;
use lion_permission::{FilePermission, PermissionSet, ALL_FILES};

use super::encoding::{check_entry, encode_entry, Parser};
use super::record::{ConditionRecord, PermissionRecord, PolicyItem};
use crate::condition::ConditionHandle;
use crate::context::PolicyContext;
use crate::registry::PolicyRegistry;

/// A conditional policy entry.
pub struct PolicyEntry {
    /// Optional identity, fixed at creation.
    name: Option<String>,

    /// Conditions and permissions in encounter order.
    items: Vec<PolicyItem>,

    /// Set once, when the entry is deleted.
    deleted: AtomicBool,

    /// The registry this entry was registered with, if any.
    registry: Weak<PolicyRegistry>,
}

impl PolicyEntry {
    /// Create a detached entry; conditions are listed before permissions.
    pub fn new(
        name: Option<String>,
        conditions: Vec<ConditionRecord>,
        permissions: Vec<PermissionRecord>,
    ) -> Self {
        let items = conditions
            .into_iter()
            .map(PolicyItem::from)
            .chain(permissions.into_iter().map(PolicyItem::from))
            .collect();
        Self::from_items(name, items)
    }

    /// Create a detached entry from interleaved items.
    pub fn from_items(name: Option<String>, items: Vec<PolicyItem>) -> Self {
        Self {
            name,
            items,
            deleted: AtomicBool::new(false),
            registry: Weak::new(),
        }
    }

    /// Decode an entry from its canonical encoding.
    pub fn decode(encoded: &str) -> Result<Self, FormatError> {
        let decoded = Parser::new(encoded).parse_entry()?;
        Ok(Self::from_items(decoded.name, decoded.items))
    }

    /// The canonical encoding of this entry.
    pub fn encode(&self) -> String {
        encode_entry(self.name.as_deref(), &self.items)
    }

    /// Check that the entry survives its own encoding.
    ///
    /// Records built in code may carry types the encoding cannot express,
    /// such as `"my cond"` or `"a(b"`. Decoded entries always pass.
    pub fn validate(&self) -> Result<(), FormatError> {
        check_entry(self.name.as_deref(), &self.items)
    }

    /// A copy of this entry bound to `registry`.
    pub(crate) fn attach(&self, registry: Weak<PolicyRegistry>) -> Self {
        Self {
            name: self.name.clone(),
            items: self.items.clone(),
            deleted: AtomicBool::new(false),
            registry,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn items(&self) -> &[PolicyItem] {
        &self.items
    }

    pub fn conditions(&self) -> impl Iterator<Item = &ConditionRecord> {
        self.items.iter().filter_map(|item| match item {
            PolicyItem::Condition(record) => Some(record),
            PolicyItem::Permission(_) => None,
        })
    }

    pub fn permissions(&self) -> impl Iterator<Item = &PermissionRecord> {
        self.items.iter().filter_map(|item| match item {
            PolicyItem::Permission(record) => Some(record),
            PolicyItem::Condition(_) => None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Returns `true` if this call deleted the entry.
    pub(crate) fn mark_deleted(&self) -> bool {
        !self.deleted.swap(true, Ordering::AcqRel)
    }

    /// Delete the entry from the registry that owns it.
    ///
    /// A detached entry is only marked deleted. Deleting twice is a no-op
    /// that returns `Ok(false)`.
    pub fn delete(&self) -> Result<bool, PolicyError> {
        match self.registry.upgrade() {
            Some(registry) => registry.delete(self),
            None => Ok(self.mark_deleted()),
        }
    }

    /// Build a handle per condition record for `bundle`.
    ///
    /// A condition that cannot be built, or whose factory panics, becomes an
    /// always-false immutable handle and is reported through the context.
    pub fn materialize_conditions(&self, bundle: &Bundle, context: &PolicyContext) -> Vec<ConditionHandle> {
        self.conditions()
            .map(|record| {
                let built = catch_unwind(AssertUnwindSafe(|| {
                    context
                        .conditions()
                        .construct(bundle, record.condition_type(), record.args())
                }))
                .unwrap_or_else(|_| Err(ConstructionError::Panicked(record.condition_type().to_string())));

                match built {
                    Ok(condition) => ConditionHandle::new(condition),
                    Err(error) => {
                        context.report(Some(bundle), &record.to_string(), &error);
                        ConditionHandle::failed()
                    }
                }
            })
            .collect()
    }

    /// Add the permissions of type `wanted_type` to `target`.
    ///
    /// Relative file paths are resolved against the bundle's data area; a
    /// record that needs a data area when none is available is skipped.
    ///
    /// # Returns
    ///
    /// The number of permissions added.
    pub fn grant_permissions(
        &self,
        bundle: Option<&Bundle>,
        target: &dyn PermissionSet,
        context: &PolicyContext,
        wanted_type: &str,
    ) -> usize {
        let mut added = 0;
        for record in self.permissions().filter(|r| r.permission_type() == wanted_type) {
            let record = match resolve_data_area(record, bundle, context) {
                Some(record) => record,
                None => {
                    tracing::debug!(entry = %self, %record, "Skipping relative file permission without a data area");
                    continue;
                }
            };

            let permission = match context
                .permissions()
                .construct(record.permission_type(), record.name(), record.actions())
            {
                Ok(permission) => permission,
                Err(error) => {
                    context.report(bundle, &record.to_string(), &error);
                    continue;
                }
            };

            match target.add(permission) {
                Ok(()) => added += 1,
                Err(error) => {
                    tracing::warn!(entry = %self, %record, %error, "Could not add permission");
                }
            }
        }
        added
    }

    /// Add every permission of the entry to `target`.
    pub fn grant_all_permissions(
        &self,
        bundle: Option<&Bundle>,
        target: &dyn PermissionSet,
        context: &PolicyContext,
    ) -> usize {
        let types: BTreeSet<&str> = self.permissions().map(PermissionRecord::permission_type).collect();
        types
            .into_iter()
            .map(|wanted| self.grant_permissions(bundle, target, context, wanted))
            .sum()
    }
}

/// Returns the record to build, or `None` when it must be skipped.
fn resolve_data_area(
    record: &PermissionRecord,
    bundle: Option<&Bundle>,
    context: &PolicyContext,
) -> Option<PermissionRecord> {
    let name = record.name();
    if record.permission_type() != FilePermission::TYPE
        || name.is_empty()
        || name == ALL_FILES
        || !Path::new(name).is_relative()
    {
        return Some(record.clone());
    }

    let root = bundle.and_then(|bundle| context.data_area(bundle))?;
    Some(record.with_name(root.join(name).to_string_lossy()))
}

impl FromStr for PolicyEntry {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for PolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for PolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEntry")
            .field("encoded", &self.encode())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

impl PartialEq for PolicyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.items == other.items
    }
}

impl Eq for PolicyEntry {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionProvider, ConditionRegistry, ConditionState};
    use crate::context::{ConstructionReporter, DataAreaRoot};
    use lion_permission::{Permission, PermissionFactory, Permissions};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl ConstructionReporter for Collect {
        fn report(&self, _bundle: Option<&Bundle>, record: &str, _error: &ConstructionError) {
            self.0.lock().push(record.to_string());
        }
    }

    fn file(name: &str, actions: &str) -> FilePermission {
        FilePermission::new(name, actions).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let entry = PolicyEntry::new(
            Some("weird \\name]".into()),
            vec![ConditionRecord::new("location", vec!["a \"b\"".into()])],
            vec![
                PermissionRecord::new("file", "/tmp/-", "read"),
                PermissionRecord::new("runtime", "exit", ""),
                PermissionRecord::new("all", "", ""),
            ],
        );
        let decoded = PolicyEntry::decode(&entry.encode()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.encode(), entry.encode());
    }

    #[test]
    fn test_validate_unencodable_types() {
        let entry = PolicyEntry::new(None, vec![ConditionRecord::new("a b", vec![])], vec![]);
        assert!(entry.validate().is_err());
        assert!(PolicyEntry::decode(&entry.encode()).is_err());

        let entry: PolicyEntry = r#"[n]{ [location "x"] (file "-" "read") }"#.parse().unwrap();
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_record_accessors_keep_order() {
        let entry: PolicyEntry = r#"{ (a "1") [c1] (b "2") [c2 "x"] }"#.parse().unwrap();
        let conditions: Vec<_> = entry.conditions().map(|c| c.condition_type()).collect();
        let permissions: Vec<_> = entry.permissions().map(|p| p.permission_type()).collect();
        assert_eq!(conditions, ["c1", "c2"]);
        assert_eq!(permissions, ["a", "b"]);
        assert_eq!(entry.encode(), r#"{ (a "1") [c1] (b "2") [c2 "x"] }"#);
    }

    #[test]
    fn test_detached_delete() {
        let entry = PolicyEntry::from_items(None, vec![]);
        assert!(!entry.is_deleted());
        assert!(entry.delete().unwrap());
        assert!(entry.is_deleted());
        assert!(!entry.delete().unwrap());
    }

    #[test]
    fn test_materialize_fails_closed() {
        let reporter = Arc::new(Collect::default());
        let conditions = ConditionRegistry::with_builtin();
        conditions.register("boom", ConditionProvider::factory(|_, _| panic!("boom")));
        let context = PolicyContext::new(Arc::new(conditions), Arc::new(PermissionFactory::with_builtin()))
            .with_reporter(reporter.clone());

        let entry: PolicyEntry = r#"{ [location "file:*"] [unknown] [boom] [location] (all) }"#.parse().unwrap();
        let bundle = Bundle::new("file:/a.jar");
        let handles = entry.materialize_conditions(&bundle, &context);

        assert_eq!(handles.len(), 4);
        assert_eq!(handles[0].state(), ConditionState::Satisfied);
        assert!(handles[1..].iter().all(ConditionHandle::is_disproved));
        assert_eq!(reporter.0.lock().len(), 3);
    }

    #[test]
    fn test_grant_permissions_by_type() {
        let context = PolicyContext::builtin();
        let entry: PolicyEntry =
            r#"{ (file "/tmp/-" "read") (property "a.*" "read") (file "/etc/hosts" "read") (socket "x") }"#
                .parse()
                .unwrap();
        let target = Permissions::new();

        assert_eq!(entry.grant_permissions(None, &target, &context, "file"), 2);
        assert_eq!(entry.grant_permissions(None, &target, &context, "socket"), 0);
        assert_eq!(target.len(), 2);
        assert!(target.implies(&file("/tmp/x", "read")));

        let all = Permissions::new();
        assert_eq!(entry.grant_all_permissions(None, &all, &context), 3);
    }

    #[test]
    fn test_relative_file_path_uses_data_area() {
        let entry: PolicyEntry = r#"{ (file "-" "read") (file "<<ALL FILES>>" "execute") }"#.parse().unwrap();
        let bundle = Bundle::new("file:/a.jar");

        // No data area: the relative record is skipped.
        let target = Permissions::new();
        assert_eq!(entry.grant_permissions(Some(&bundle), &target, &PolicyContext::builtin(), "file"), 1);

        let context = PolicyContext::builtin().with_data_area(Arc::new(DataAreaRoot::new("/data")));
        let target = Permissions::new();
        assert_eq!(entry.grant_permissions(Some(&bundle), &target, &context, "file"), 2);
        let inside = format!("/data/{}/cache/x", bundle.id());
        assert!(target.implies(&file(&inside, "read")));
        assert!(!target.implies(&file("/elsewhere", "read")));

        // Without a bundle there is no data area either.
        let target = Permissions::new();
        assert_eq!(entry.grant_permissions(None, &target, &context, "file"), 1);
        let granted = target.elements().unwrap();
        assert_eq!(granted[0].name(), ALL_FILES);
    }

    #[test]
    fn test_grant_into_read_only_target() {
        let entry: PolicyEntry = "{ (all) }".parse().unwrap();
        let target = Permissions::new();
        target.set_read_only();
        assert_eq!(entry.grant_all_permissions(None, &target, &PolicyContext::builtin()), 0);
    }
}
