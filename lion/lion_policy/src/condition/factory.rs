//! Condition factories.
//!
//! Condition types are registered with one of two provider forms, chosen at
//! registration time. A `Factory` provider may hand back a shared or already
//! decided condition; a `Constructor` provider always builds a fresh one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lion_core::error::ConstructionError;
use lion_core::Bundle;
use parking_lot::RwLock;

use super::location::BundleLocationCondition;
use super::Condition;

/// Builds runtime conditions for `(bundle, type, args)`.
pub trait ConditionFactory: Send + Sync {
    fn construct(
        &self,
        bundle: &Bundle,
        condition_type: &str,
        args: &[String],
    ) -> Result<Arc<dyn Condition>, ConstructionError>;
}

type FactoryFn =
    Arc<dyn Fn(&Bundle, &[String]) -> Result<Arc<dyn Condition>, ConstructionError> + Send + Sync>;
type ConstructorFn =
    Arc<dyn Fn(&Bundle, &[String]) -> Result<Box<dyn Condition>, ConstructionError> + Send + Sync>;

/// How a condition type is built.
#[derive(Clone)]
pub enum ConditionProvider {
    Factory(FactoryFn),
    Constructor(ConstructorFn),
}

impl ConditionProvider {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Bundle, &[String]) -> Result<Arc<dyn Condition>, ConstructionError> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    pub fn constructor<F>(f: F) -> Self
    where
        F: Fn(&Bundle, &[String]) -> Result<Box<dyn Condition>, ConstructionError> + Send + Sync + 'static,
    {
        Self::Constructor(Arc::new(f))
    }

    fn provide(&self, bundle: &Bundle, args: &[String]) -> Result<Arc<dyn Condition>, ConstructionError> {
        match self {
            Self::Factory(f) => f(bundle, args),
            Self::Constructor(f) => f(bundle, args).map(Arc::from),
        }
    }
}

impl fmt::Debug for ConditionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Factory(_) => f.write_str("ConditionProvider::Factory"),
            Self::Constructor(_) => f.write_str("ConditionProvider::Constructor"),
        }
    }
}

/// Condition providers keyed by condition type.
#[derive(Default)]
pub struct ConditionRegistry {
    providers: RwLock<HashMap<String, ConditionProvider>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `location` condition registered.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(
            BundleLocationCondition::TYPE,
            ConditionProvider::factory(BundleLocationCondition::get_condition),
        );
        registry
    }

    /// Register a provider, replacing any previous one for the type.
    pub fn register(&self, condition_type: impl Into<String>, provider: ConditionProvider) {
        self.providers.write().insert(condition_type.into(), provider);
    }

    pub fn is_registered(&self, condition_type: &str) -> bool {
        self.providers.read().contains_key(condition_type)
    }
}

impl ConditionFactory for ConditionRegistry {
    fn construct(
        &self,
        bundle: &Bundle,
        condition_type: &str,
        args: &[String],
    ) -> Result<Arc<dyn Condition>, ConstructionError> {
        let provider = self
            .providers
            .read()
            .get(condition_type)
            .cloned()
            .ok_or_else(|| ConstructionError::UnknownType(condition_type.to_string()))?;
        provider.provide(bundle, args)
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers = self.providers.read();
        let mut types: Vec<&String> = providers.keys().collect();
        types.sort();
        f.debug_struct("ConditionRegistry").field("types", &types).finish()
    }
}
