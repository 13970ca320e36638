//! Per-bundle evaluation of conditional policy.
//!
//! Each registered entry is classified for the bundle as satisfied, pending
//! or pruned:
//!
//! * **Pruned** - some condition is immutable and unsatisfied. The entry
//!   can never apply and is discarded.
//! * **Satisfied** - every condition is immutable and satisfied. The entry's
//!   permissions are merged into one collection and the entry is forgotten.
//! * **Pending** - anything else. The entry keeps its condition handles and
//!   its permissions, and is checked on demand.
//!
//! Entries only move pending → satisfied or pending → pruned. Entries
//! deleted from the registry after being merged stay granted until the
//! state is rebuilt.
//!
//! Mutable conditions are re-evaluated on every query that reaches their
//! entry. A pending entry grants only while none of its conditions is
//! currently false: an unsatisfied mutable condition denies the entry for
//! that query, without pruning it. Conditions that have not been evaluated
//! yet are not assumed to hold.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lion_core::error::PermissionError;
use lion_core::Bundle;
use lion_permission::{Permission, PermissionSet, Permissions};
use parking_lot::Mutex;

use crate::condition::ConditionHandle;
use crate::context::PolicyContext;
use crate::model::PolicyEntry;
use crate::registry::{EntryInbox, PolicyRegistry};

/// Result of one conditional query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub granted: bool,

    /// No satisfied permissions and no pending entry left with any.
    pub structurally_empty: bool,
}

/// Bucket sizes of an evaluation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    pub satisfied_entries: usize,
    pub satisfied_permissions: usize,
    pub pending: usize,
    pub pruned: usize,
}

/// Outcome of checking a pending entry's conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// All conditions immutable and satisfied.
    Proven,
    /// All conditions currently satisfied, some may change.
    Holds,
    /// A mutable condition is currently unsatisfied.
    Fails,
    /// An immutable condition is unsatisfied.
    Disproved,
}

struct PendingEntry {
    entry: Arc<PolicyEntry>,
    handles: Vec<ConditionHandle>,
    permissions: Permissions,
}

impl PendingEntry {
    fn check(&mut self) -> Verdict {
        for handle in &mut self.handles {
            if !handle.evaluate() {
                return if handle.is_disproved() {
                    Verdict::Disproved
                } else {
                    Verdict::Fails
                };
            }
        }
        if self.handles.iter().all(ConditionHandle::is_proven) {
            Verdict::Proven
        } else {
            Verdict::Holds
        }
    }

    fn is_exhausted(&self) -> bool {
        self.permissions.is_empty()
    }
}

#[derive(Default)]
struct Buckets {
    pending: Vec<PendingEntry>,
    satisfied_entries: usize,
    pruned: usize,
}

/// Conditional policy evaluation state for one bundle.
pub struct ConditionEvaluationState {
    bundle: Bundle,
    context: PolicyContext,

    /// Entries registered after construction, not yet classified.
    inbox: Arc<EntryInbox>,

    /// Permissions of every satisfied entry.
    satisfied: Permissions,

    /// Mutated only under this lock.
    buckets: Mutex<Buckets>,

    last_empty: AtomicBool,
}

impl ConditionEvaluationState {
    /// Build the state of `bundle` from the current registry entries.
    pub fn new(registry: &PolicyRegistry, bundle: Bundle, context: PolicyContext) -> Self {
        let (inbox, entries) = registry.subscribe();
        let state = Self {
            bundle,
            context,
            inbox,
            satisfied: Permissions::new(),
            buckets: Mutex::new(Buckets::default()),
            last_empty: AtomicBool::new(false),
        };

        {
            let mut buckets = state.buckets.lock();
            for entry in entries {
                state.classify(&mut buckets, entry);
            }
        }

        let stats = state.stats();
        tracing::debug!(
            bundle = %state.bundle,
            satisfied = stats.satisfied_entries,
            pending = stats.pending,
            pruned = stats.pruned,
            "Built conditional evaluation state"
        );
        state
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    fn classify(&self, buckets: &mut Buckets, entry: Arc<PolicyEntry>) {
        if entry.is_deleted() {
            tracing::trace!(bundle = %self.bundle, entry = %entry, "Ignoring deleted entry");
            return;
        }

        let handles = entry.materialize_conditions(&self.bundle, &self.context);
        if handles.iter().any(ConditionHandle::is_disproved) {
            tracing::debug!(bundle = %self.bundle, entry = %entry, "Pruned policy entry");
            buckets.pruned += 1;
        } else if handles.iter().all(ConditionHandle::is_proven) {
            let granted = entry.grant_all_permissions(Some(&self.bundle), &self.satisfied, &self.context);
            tracing::debug!(bundle = %self.bundle, entry = %entry, granted, "Satisfied policy entry");
            buckets.satisfied_entries += 1;
        } else {
            let permissions = Permissions::new();
            entry.grant_all_permissions(Some(&self.bundle), &permissions, &self.context);
            tracing::debug!(bundle = %self.bundle, entry = %entry, "Pending policy entry");
            buckets.pending.push(PendingEntry {
                entry,
                handles,
                permissions,
            });
        }
    }

    fn absorb_new_entries(&self) {
        if self.inbox.is_empty() {
            return;
        }
        let mut buckets = self.buckets.lock();
        for entry in self.inbox.drain() {
            self.classify(&mut buckets, entry);
        }
    }

    /// Evaluate `permission` against the conditional policy.
    pub fn evaluate(&self, permission: &dyn Permission) -> Evaluation {
        self.absorb_new_entries();

        // Fast path, no bucket lock
        if self.satisfied.implies(permission) {
            return self.finish(true, false);
        }

        let mut buckets = self.buckets.lock();

        // Another query may have promoted an entry meanwhile
        if self.satisfied.implies(permission) {
            return self.finish(true, false);
        }

        let mut granted = false;
        let mut index = 0;
        while index < buckets.pending.len() {
            let pending = &mut buckets.pending[index];
            if pending.entry.is_deleted() || pending.is_exhausted() {
                buckets.pending.remove(index);
                continue;
            }
            if !pending.permissions.implies(permission) {
                index += 1;
                continue;
            }

            match pending.check() {
                Verdict::Fails => index += 1,
                Verdict::Disproved => {
                    let pruned = buckets.pending.remove(index);
                    tracing::debug!(bundle = %self.bundle, entry = %pruned.entry, "Pruned policy entry");
                    buckets.pruned += 1;
                }
                Verdict::Holds => {
                    granted = true;
                    break;
                }
                Verdict::Proven => {
                    let promoted = buckets.pending.remove(index);
                    if let Err(error) = self.satisfied.extend_from(&promoted.permissions) {
                        tracing::warn!(bundle = %self.bundle, %error, "Could not merge satisfied permissions");
                    }
                    tracing::debug!(bundle = %self.bundle, entry = %promoted.entry, "Promoted policy entry");
                    buckets.satisfied_entries += 1;
                    granted = true;
                    break;
                }
            }
        }

        let empty = !granted
            && self.satisfied.is_empty()
            && buckets.pending.iter().all(PendingEntry::is_exhausted);
        self.finish(granted, empty)
    }

    fn finish(&self, granted: bool, structurally_empty: bool) -> Evaluation {
        self.last_empty.store(structurally_empty, Ordering::Release);
        tracing::trace!(bundle = %self.bundle, granted, structurally_empty, "Conditional query");
        Evaluation {
            granted,
            structurally_empty,
        }
    }

    /// Check `permission` against the conditional policy.
    pub fn implies(&self, permission: &dyn Permission) -> bool {
        self.evaluate(permission).granted
    }

    /// Whether the last query found no applicable conditional policy.
    ///
    /// Only meaningful right after [`ConditionEvaluationState::implies`];
    /// concurrent queries should use [`ConditionEvaluationState::evaluate`].
    pub fn is_structurally_empty(&self) -> bool {
        self.last_empty.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> EvaluationStats {
        let buckets = self.buckets.lock();
        EvaluationStats {
            satisfied_entries: buckets.satisfied_entries,
            satisfied_permissions: self.satisfied.len(),
            pending: buckets.pending.len(),
            pruned: buckets.pruned,
        }
    }
}

impl PermissionSet for ConditionEvaluationState {
    fn implies(&self, permission: &dyn Permission) -> bool {
        ConditionEvaluationState::implies(self, permission)
    }

    fn add(&self, _permission: Arc<dyn Permission>) -> Result<(), PermissionError> {
        Err(PermissionError::ReadOnly)
    }

    fn elements(&self) -> Result<Vec<Arc<dyn Permission>>, PermissionError> {
        Err(PermissionError::EnumerationUnsupported(
            "conditional permissions depend on runtime state".into(),
        ))
    }
}

impl fmt::Debug for ConditionEvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEvaluationState")
            .field("bundle", &self.bundle)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionProvider, ConditionRegistry};
    use lion_permission::{NamedPermission, PermissionFactory};
    use std::sync::atomic::AtomicUsize;

    /// A mutable condition driven by the test.
    #[derive(Debug, Default)]
    struct Switch {
        on: AtomicBool,
        evaluations: AtomicUsize,
    }

    impl Condition for Switch {
        fn is_satisfied(&self) -> bool {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            self.on.load(Ordering::SeqCst)
        }

        fn is_mutable(&self) -> bool {
            true
        }
    }

    /// An immutable condition evaluated lazily.
    #[derive(Debug)]
    struct Lazy(bool);

    impl Condition for Lazy {
        fn is_satisfied(&self) -> bool {
            self.0
        }

        fn is_mutable(&self) -> bool {
            false
        }
    }

    fn context(switch: Arc<Switch>) -> PolicyContext {
        let conditions = ConditionRegistry::with_builtin();
        conditions.register(
            "switch",
            ConditionProvider::factory(move |_, _| Ok(switch.clone() as Arc<dyn Condition>)),
        );
        conditions.register(
            "lazy",
            ConditionProvider::constructor(|_, args| Ok(Box::new(Lazy(args.first().map(String::as_str) == Some("yes"))))),
        );
        PolicyContext::new(Arc::new(conditions), Arc::new(PermissionFactory::with_builtin()))
    }

    fn prop(name: &str) -> NamedPermission {
        NamedPermission::new("property", name, "read").unwrap()
    }

    fn bundle() -> Bundle {
        Bundle::new("file:/opt/app.jar")
    }

    #[test]
    fn test_classification() {
        let registry = PolicyRegistry::in_memory();
        registry.add_encoded(r#"{ [location "file:/opt/*"] (property "a" "read") }"#).unwrap();
        registry.add_encoded(r#"{ [location "http:*"] (property "b" "read") }"#).unwrap();
        registry.add_encoded(r#"{ [switch] (property "c" "read") }"#).unwrap();
        registry.add_encoded(r#"{ (property "d" "read") }"#).unwrap();

        let state = ConditionEvaluationState::new(&registry, bundle(), context(Arc::default()));
        let stats = state.stats();
        assert_eq!(stats.satisfied_entries, 2);
        assert_eq!(stats.satisfied_permissions, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.pruned, 1);

        assert!(state.implies(&prop("a")));
        assert!(!state.implies(&prop("b")));
        assert!(state.implies(&prop("d")));
    }

    #[test]
    fn test_mutable_condition_follows_state() {
        let switch = Arc::new(Switch::default());
        let registry = PolicyRegistry::in_memory();
        registry.add_encoded(r#"{ [switch] (property "c" "read") }"#).unwrap();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(switch.clone()));

        assert!(!state.implies(&prop("c")));
        assert!(!state.implies(&prop("c")));
        switch.on.store(true, Ordering::SeqCst);
        assert!(state.implies(&prop("c")));
        assert!(state.implies(&prop("c")));
        switch.on.store(false, Ordering::SeqCst);
        assert!(!state.implies(&prop("c")));

        // Denied for now, but the entry still applies to the bundle.
        assert_eq!(
            state.evaluate(&prop("c")),
            Evaluation { granted: false, structurally_empty: false }
        );

        // Never satisfied, stays pending.
        assert_eq!(state.stats().pending, 1);
        assert_eq!(state.stats().satisfied_entries, 0);
    }

    #[test]
    fn test_conditions_only_evaluated_for_matching_entries() {
        let switch = Arc::new(Switch::default());
        let registry = PolicyRegistry::in_memory();
        registry.add_encoded(r#"{ [switch] (property "c" "read") }"#).unwrap();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(switch.clone()));

        assert!(!state.implies(&prop("other")));
        assert_eq!(switch.evaluations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lazy_immutable_conditions() {
        let registry = PolicyRegistry::in_memory();
        registry.add_encoded(r#"{ [lazy "yes"] (property "y" "read") }"#).unwrap();
        registry.add_encoded(r#"{ [lazy "no"] (property "n" "read") }"#).unwrap();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(Arc::default()));
        assert_eq!(state.stats().pending, 2);

        assert!(state.implies(&prop("y")));
        assert!(!state.implies(&prop("n")));

        let stats = state.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.satisfied_entries, 1);
        assert_eq!(stats.pruned, 1);
        assert!(state.implies(&prop("y")));
    }

    #[test]
    fn test_mixed_conditions_prune_on_immutable_failure() {
        let switch = Arc::new(Switch::default());
        switch.on.store(true, Ordering::SeqCst);
        let registry = PolicyRegistry::in_memory();
        registry.add_encoded(r#"{ [switch] [lazy "no"] (property "p" "read") }"#).unwrap();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(switch));

        assert!(!state.implies(&prop("p")));
        assert_eq!(state.stats().pruned, 1);
        assert_eq!(state.stats().pending, 0);
    }

    #[test]
    fn test_absorbs_entries_added_later() {
        let registry = PolicyRegistry::in_memory();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(Arc::default()));
        assert!(!state.implies(&prop("late")));
        assert!(state.is_structurally_empty());

        registry.add_encoded(r#"{ (property "late" "read") }"#).unwrap();
        assert!(state.implies(&prop("late")));
        assert!(!state.is_structurally_empty());
        assert_eq!(state.stats().satisfied_entries, 1);
    }

    #[test]
    fn test_structural_emptiness() {
        let switch = Arc::new(Switch::default());
        let registry = PolicyRegistry::in_memory();
        registry.add_encoded(r#"{ [switch] (socket "x") }"#).unwrap();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(switch));

        // The only pending entry grants nothing buildable.
        let evaluation = state.evaluate(&prop("x"));
        assert_eq!(
            evaluation,
            Evaluation {
                granted: false,
                structurally_empty: true
            }
        );
        assert_eq!(state.stats().pending, 0);

        registry.add_encoded(r#"{ [switch] (property "x" "read") }"#).unwrap();
        let evaluation = state.evaluate(&prop("other"));
        assert!(!evaluation.granted);
        assert!(!evaluation.structurally_empty);
    }

    #[test]
    fn test_deleted_entries() {
        let switch = Arc::new(Switch::default());
        switch.on.store(true, Ordering::SeqCst);
        let registry = PolicyRegistry::in_memory();
        let satisfied = registry.add_encoded(r#"[s]{ (property "s" "read") }"#).unwrap();
        let pending = registry.add_encoded(r#"[p]{ [switch] (property "p" "read") }"#).unwrap();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(switch));

        satisfied.delete().unwrap();
        pending.delete().unwrap();

        // Merged grants are stale by design; pending entries are dropped.
        assert!(state.implies(&prop("s")));
        assert!(!state.implies(&prop("p")));
        assert_eq!(state.stats().pending, 0);
    }

    #[test]
    fn test_read_only_view() {
        let registry = PolicyRegistry::in_memory();
        let state = ConditionEvaluationState::new(&registry, bundle(), context(Arc::default()));
        assert_eq!(state.add(Arc::new(prop("a"))), Err(PermissionError::ReadOnly));
        assert!(matches!(state.elements(), Err(PermissionError::EnumerationUnsupported(_))));
    }
}
