//! Policy manager.
//!
//! The manager owns every policy source and hands out one combiner per
//! bundle. Evaluation states and combiners are created on the first query
//! for a bundle and cached until invalidated.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use lion_core::error::{ConstructionError, Error, PolicyError};
use lion_core::{Bundle, BundleId, PolicyConfig};
use lion_permission::{Permission, PermissionSet, Permissions};
use parking_lot::RwLock;

use crate::assigned::AssignedPermissions;
use crate::context::{DataAreaRoot, PolicyContext};
use crate::engine::{ConditionEvaluationState, Decision, PermissionPrecedenceCombiner};
use crate::model::{parse_permission_records, PermissionRecord, PolicyEntry};
use crate::registry::PolicyRegistry;
use crate::store::{FilePolicyStorage, InMemoryPolicyStorage, PolicyStorage};

/// Resolves permission queries for bundles.
pub struct PolicyManager {
    registry: Arc<PolicyRegistry>,
    context: PolicyContext,

    /// Granted to every bundle.
    implied: RwLock<Vec<PermissionRecord>>,

    /// Upper bound on everything but the implied permissions.
    restricted: RwLock<Option<Vec<PermissionRecord>>>,

    assigned: AssignedPermissions,

    states: DashMap<BundleId, Arc<ConditionEvaluationState>>,
    combiners: DashMap<BundleId, Arc<PermissionPrecedenceCombiner>>,

    /// Shared while a cache entry is built and inserted, exclusive while
    /// caches are dropped or policy sources replaced. A build never
    /// straddles an invalidation.
    epoch: RwLock<()>,
}

impl PolicyManager {
    /// Create a manager with no implied, restricted or assigned permissions.
    pub fn new(registry: Arc<PolicyRegistry>, context: PolicyContext) -> Self {
        Self {
            registry,
            context,
            implied: RwLock::new(Vec::new()),
            restricted: RwLock::new(None),
            assigned: AssignedPermissions::new(),
            states: DashMap::new(),
            combiners: DashMap::new(),
            epoch: RwLock::new(()),
        }
    }

    /// Build a manager from configuration.
    ///
    /// Loads the conditional policy from `storage` when configured, and
    /// resolves bundle data areas under `data_area`.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, Error> {
        let storage: Arc<dyn PolicyStorage> = match &config.storage {
            Some(path) => Arc::new(FilePolicyStorage::new(path)),
            None => Arc::new(InMemoryPolicyStorage::new()),
        };
        let registry = PolicyRegistry::load(storage)?;

        let mut context = PolicyContext::builtin();
        if let Some(root) = &config.data_area {
            context = context.with_data_area(Arc::new(DataAreaRoot::new(root)));
        }

        let manager = Self::new(registry, context);
        manager.set_implied_permissions(parse_permission_records(&config.implied)?);
        manager.set_restricted_permissions(
            config.restricted.as_deref().map(parse_permission_records).transpose()?,
        );
        manager.set_default_permissions(
            config
                .default_permissions
                .as_deref()
                .map(parse_permission_records)
                .transpose()?,
        );
        for (location, encoded) in &config.locations {
            manager.set_location_permissions(location.clone(), Some(parse_permission_records(encoded)?));
        }

        tracing::info!(
            entries = manager.registry.len(),
            overrides = config.locations.len(),
            "Policy manager configured"
        );
        Ok(manager)
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &PolicyContext {
        &self.context
    }

    pub fn assigned(&self) -> &AssignedPermissions {
        &self.assigned
    }

    /// The evaluation state of `bundle`, built on first use.
    pub fn evaluation_state(&self, bundle: &Bundle) -> Arc<ConditionEvaluationState> {
        if let Some(state) = self.states.get(&bundle.id()) {
            return Arc::clone(state.value());
        }

        let _epoch = self.epoch.read();
        self.state_for(bundle)
    }

    /// Caller holds `epoch` shared.
    fn state_for(&self, bundle: &Bundle) -> Arc<ConditionEvaluationState> {
        if let Some(state) = self.states.get(&bundle.id()) {
            return Arc::clone(state.value());
        }

        // Build outside the shard lock; the first insert wins
        let built = Arc::new(ConditionEvaluationState::new(
            &self.registry,
            bundle.clone(),
            self.context.clone(),
        ));
        Arc::clone(self.states.entry(bundle.id()).or_insert(built).value())
    }

    /// The combiner of `bundle`, built on first use.
    pub fn combiner(&self, bundle: &Bundle) -> Arc<PermissionPrecedenceCombiner> {
        if let Some(combiner) = self.combiners.get(&bundle.id()) {
            return Arc::clone(combiner.value());
        }

        let _epoch = self.epoch.read();
        if let Some(combiner) = self.combiners.get(&bundle.id()) {
            return Arc::clone(combiner.value());
        }
        let built = Arc::new(self.build_combiner(bundle));
        Arc::clone(self.combiners.entry(bundle.id()).or_insert(built).value())
    }

    fn build_combiner(&self, bundle: &Bundle) -> PermissionPrecedenceCombiner {
        let baseline = self.materialize(&self.implied.read(), bundle);
        let mut combiner = PermissionPrecedenceCombiner::new(baseline);

        if let Some(restricted) = self.restricted.read().as_ref() {
            combiner = combiner.with_ceiling(self.materialize(restricted, bundle));
        }
        if let Some((records, is_default)) = self.assigned.lookup(bundle.location()) {
            combiner = combiner.with_assigned(self.materialize(&records, bundle), is_default);
        }

        tracing::debug!(%bundle, is_default = combiner.is_default(), "Built permission combiner");
        combiner.with_conditional(self.state_for(bundle))
    }

    fn materialize(&self, records: &[PermissionRecord], bundle: &Bundle) -> Arc<dyn PermissionSet> {
        let permissions = Permissions::new();
        PolicyEntry::new(None, Vec::new(), records.to_vec()).grant_all_permissions(
            Some(bundle),
            &permissions,
            &self.context,
        );
        permissions.set_read_only();
        Arc::new(permissions)
    }

    /// Check whether `bundle` holds `permission`.
    pub fn has_permission(&self, bundle: &Bundle, permission: &dyn Permission) -> bool {
        self.combiner(bundle).implies(permission)
    }

    /// Decide `permission` for `bundle`, naming the deciding source.
    pub fn decide(&self, bundle: &Bundle, permission: &dyn Permission) -> Decision {
        self.combiner(bundle).decide(permission)
    }

    /// Build the permission `(permission_type, name, actions)` and decide it.
    pub fn check(
        &self,
        bundle: &Bundle,
        permission_type: &str,
        name: &str,
        actions: &str,
    ) -> Result<Decision, ConstructionError> {
        let permission = self.context.permissions().construct(permission_type, name, actions)?;
        Ok(self.decide(bundle, permission.as_ref()))
    }

    /// Drop the cached state of `bundle`; the next query rebuilds it.
    ///
    /// This is the only way grants of deleted entries are revoked.
    pub fn invalidate(&self, bundle: &Bundle) {
        let _epoch = self.epoch.write();
        self.combiners.remove(&bundle.id());
        self.states.remove(&bundle.id());
        tracing::debug!(%bundle, "Invalidated cached policy state");
    }

    /// Drop the cached state of every bundle.
    pub fn invalidate_all(&self) {
        let _epoch = self.epoch.write();
        self.combiners.clear();
        self.states.clear();
        tracing::debug!("Invalidated all cached policy state");
    }

    pub fn set_implied_permissions(&self, records: Vec<PermissionRecord>) {
        let _epoch = self.epoch.write();
        *self.implied.write() = records;
        self.combiners.clear();
    }

    pub fn set_restricted_permissions(&self, records: Option<Vec<PermissionRecord>>) {
        let _epoch = self.epoch.write();
        *self.restricted.write() = records;
        self.combiners.clear();
    }

    pub fn set_default_permissions(&self, records: Option<Vec<PermissionRecord>>) {
        let _epoch = self.epoch.write();
        self.assigned.set_default_permissions(records);
        self.combiners.clear();
    }

    pub fn set_location_permissions(&self, location: impl Into<String>, records: Option<Vec<PermissionRecord>>) {
        let _epoch = self.epoch.write();
        self.assigned.set_location_permissions(location, records);
        self.combiners.clear();
    }

    /// Register an encoded conditional entry.
    pub fn add_entry(&self, encoded: &str) -> Result<Arc<PolicyEntry>, PolicyError> {
        self.registry.add_encoded(encoded)
    }
}

impl fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyManager")
            .field("registry", &self.registry)
            .field("states", &self.states.len())
            .field("combiners", &self.combiners.len())
            .finish()
    }
}
