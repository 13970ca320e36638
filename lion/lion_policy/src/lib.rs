//! # Lion Policy
//!
//! Conditional permission policy for Lion bundles.
//!
//! A bundle's permissions come from four sources, combined in a fixed
//! precedence order:
//!
//! 1. **Implied** permissions, granted to every bundle.
//! 2. **Restricted** permissions, an optional ceiling on everything below.
//! 3. **Assigned** permissions, a default or a per-location override.
//! 4. **Conditional** permissions, policy entries gated by conditions
//!    evaluated for the bundle at runtime.
//!
//! Conditional entries are kept in a [`PolicyRegistry`] and written in a
//! canonical text form:
//!
//! ```text
//! [name]{ [location "file:/opt/*"] (file "-" "read,write") }
//! ```
//!
//! Per-bundle evaluation state is cached by the [`PolicyManager`]. Deleting
//! an entry does not revoke grants already cached for a bundle until that
//! bundle's state is invalidated.

pub mod assigned;
pub mod condition;
pub mod context;
pub mod engine;
pub mod manager;
pub mod model;
pub mod registry;
pub mod store;

// Re-export key types for convenience
pub use assigned::AssignedPermissions;
pub use condition::{
    BundleLocationCondition, Condition, ConditionFactory, ConditionHandle, ConditionProvider,
    ConditionRegistry, ConditionState, FixedCondition,
};
pub use context::{ConstructionReporter, DataAreaResolver, DataAreaRoot, PolicyContext, TracingReporter};
pub use engine::{ConditionEvaluationState, Decision, Evaluation, EvaluationStats, PermissionPrecedenceCombiner};
pub use manager::PolicyManager;
pub use model::{parse_permission_records, ConditionRecord, PermissionRecord, PolicyEntry, PolicyItem};
pub use registry::PolicyRegistry;
pub use store::{FilePolicyStorage, InMemoryPolicyStorage, PolicyStorage};
