//! Permission factories.
//!
//! Permission types are resolved through an explicit table of registered
//! constructors. A type may register several constructor forms; the richest
//! one wins, in the fixed order full > named > bare, and receives only the
//! arguments it accepts.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use lion_core::error::{ConstructionError, PermissionError};
use parking_lot::RwLock;

use crate::model::{AllPermission, FilePermission, NamedPermission, Permission};

type ConstructResult = Result<Arc<dyn Permission>, PermissionError>;

/// Constructor taking `(type, name, actions)`.
pub type FullFn = Arc<dyn Fn(&str, &str, &str) -> ConstructResult + Send + Sync>;

/// Constructor taking only the name.
pub type NamedFn = Arc<dyn Fn(&str) -> ConstructResult + Send + Sync>;

/// Constructor taking no arguments.
pub type BareFn = Arc<dyn Fn() -> ConstructResult + Send + Sync>;

/// Number of record fields a constructor form consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arity {
    Bare = 0,
    Named = 1,
    Full = 3,
}

/// A registered constructor form.
#[derive(Clone)]
pub enum PermissionConstructor {
    Full(FullFn),
    Named(NamedFn),
    Bare(BareFn),
}

impl PermissionConstructor {
    pub fn full<F>(f: F) -> Self
    where
        F: Fn(&str, &str, &str) -> ConstructResult + Send + Sync + 'static,
    {
        Self::Full(Arc::new(f))
    }

    pub fn named<F>(f: F) -> Self
    where
        F: Fn(&str) -> ConstructResult + Send + Sync + 'static,
    {
        Self::Named(Arc::new(f))
    }

    pub fn bare<F>(f: F) -> Self
    where
        F: Fn() -> ConstructResult + Send + Sync + 'static,
    {
        Self::Bare(Arc::new(f))
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Full(_) => Arity::Full,
            Self::Named(_) => Arity::Named,
            Self::Bare(_) => Arity::Bare,
        }
    }

    fn invoke(&self, permission_type: &str, name: &str, actions: &str) -> ConstructResult {
        match self {
            Self::Full(f) => f(permission_type, name, actions),
            Self::Named(f) => f(name),
            Self::Bare(f) => f(),
        }
    }
}

impl fmt::Debug for PermissionConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionConstructor::{:?}", self.arity())
    }
}

/// Registered-constructor table keyed by permission type.
#[derive(Default)]
pub struct PermissionFactory {
    constructors: RwLock<HashMap<String, Vec<PermissionConstructor>>>,
}

impl PermissionFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with the built-in permission types registered.
    ///
    /// * `file` - [`FilePermission`], full form.
    /// * `all` - [`AllPermission`], bare form.
    /// * `property`, `service`, `package`, `bundle`, `admin` -
    ///   [`NamedPermission`], full form.
    /// * `runtime` - [`NamedPermission`] without actions, named form.
    pub fn with_builtin() -> Self {
        let factory = Self::new();
        factory.register(
            FilePermission::TYPE,
            PermissionConstructor::full(|_, name, actions| {
                Ok(Arc::new(FilePermission::new(name, actions)?))
            }),
        );
        factory.register(
            AllPermission::TYPE,
            PermissionConstructor::bare(|| Ok(Arc::new(AllPermission))),
        );
        for permission_type in ["property", "service", "package", "bundle", "admin"] {
            factory.register(
                permission_type,
                PermissionConstructor::full(|permission_type, name, actions| {
                    Ok(Arc::new(NamedPermission::new(permission_type, name, actions)?))
                }),
            );
        }
        factory.register(
            "runtime",
            PermissionConstructor::named(|name| Ok(Arc::new(NamedPermission::new("runtime", name, "")?))),
        );
        factory
    }

    /// Register a constructor form for a permission type.
    ///
    /// Registering a second constructor of the same arity replaces the first.
    pub fn register(&self, permission_type: impl Into<String>, constructor: PermissionConstructor) {
        let mut constructors = self.constructors.write();
        let forms = constructors.entry(permission_type.into()).or_default();
        forms.retain(|existing| existing.arity() != constructor.arity());
        forms.push(constructor);
        forms.sort_by(|a, b| b.arity().cmp(&a.arity()));
    }

    /// Whether any constructor is registered for `permission_type`.
    pub fn is_registered(&self, permission_type: &str) -> bool {
        self.constructors.read().contains_key(permission_type)
    }

    /// The arities registered for a type, richest first.
    pub fn arities(&self, permission_type: &str) -> Vec<Arity> {
        self.constructors
            .read()
            .get(permission_type)
            .map(|forms| forms.iter().map(PermissionConstructor::arity).collect())
            .unwrap_or_default()
    }

    /// Construct a permission using the richest registered form.
    ///
    /// # Returns
    ///
    /// * `Ok(permission)` - The constructed permission.
    /// * `Err(ConstructionError)` - If the type is unknown, no form is
    ///   registered, or the constructor failed or panicked.
    pub fn construct(
        &self,
        permission_type: &str,
        name: &str,
        actions: &str,
    ) -> Result<Arc<dyn Permission>, ConstructionError> {
        let constructor = {
            let constructors = self.constructors.read();
            let forms = constructors
                .get(permission_type)
                .ok_or_else(|| ConstructionError::UnknownType(permission_type.to_string()))?;
            forms
                .first()
                .cloned()
                .ok_or_else(|| ConstructionError::NoConstructor(permission_type.to_string()))?
        };

        match catch_unwind(AssertUnwindSafe(|| constructor.invoke(permission_type, name, actions))) {
            Ok(Ok(permission)) => Ok(permission),
            Ok(Err(e)) => Err(ConstructionError::failed(permission_type, e.to_string())),
            Err(_) => Err(ConstructionError::Panicked(permission_type.to_string())),
        }
    }
}

impl fmt::Debug for PermissionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let constructors = self.constructors.read();
        let mut types: Vec<&String> = constructors.keys().collect();
        types.sort();
        f.debug_struct("PermissionFactory").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let factory = PermissionFactory::with_builtin();

        let file = factory.construct("file", "/tmp/a", "read").unwrap();
        assert_eq!(file.permission_type(), "file");
        assert_eq!(file.actions(), "read");

        let all = factory.construct("all", "ignored", "ignored").unwrap();
        assert_eq!(all.permission_type(), "all");

        let service = factory.construct("service", "org.example.*", "get").unwrap();
        assert_eq!(service.permission_type(), "service");

        let runtime = factory.construct("runtime", "exit", "ignored").unwrap();
        assert_eq!(runtime.name(), "exit");
        assert_eq!(runtime.actions(), "");
    }

    #[test]
    fn test_unknown_type() {
        let factory = PermissionFactory::with_builtin();
        assert_eq!(
            factory.construct("socket", "*", "connect").unwrap_err(),
            ConstructionError::UnknownType("socket".into())
        );
    }

    #[test]
    fn test_constructor_failure_is_scoped() {
        let factory = PermissionFactory::with_builtin();
        let err = factory.construct("file", "/tmp", "fly").unwrap_err();
        assert!(matches!(err, ConstructionError::Failed { .. }));
    }

    #[test]
    fn test_richest_form_wins() {
        let factory = PermissionFactory::new();
        factory.register(
            "custom",
            PermissionConstructor::bare(|| Ok(Arc::new(NamedPermission::new("custom", "bare", "")?))),
        );
        factory.register(
            "custom",
            PermissionConstructor::named(|name| Ok(Arc::new(NamedPermission::new("custom", name, "")?))),
        );
        assert_eq!(factory.arities("custom"), vec![Arity::Named, Arity::Bare]);
        assert_eq!(factory.construct("custom", "n", "a").unwrap().name(), "n");

        factory.register(
            "custom",
            PermissionConstructor::full(|t, name, actions| Ok(Arc::new(NamedPermission::new(t, name, actions)?))),
        );
        assert_eq!(factory.arities("custom"), vec![Arity::Full, Arity::Named, Arity::Bare]);
        assert_eq!(factory.construct("custom", "n", "a").unwrap().actions(), "a");
    }

    #[test]
    fn test_panicking_constructor() {
        let factory = PermissionFactory::new();
        factory.register("boom", PermissionConstructor::bare(|| panic!("boom")));
        assert_eq!(
            factory.construct("boom", "", "").unwrap_err(),
            ConstructionError::Panicked("boom".into())
        );
    }
}
