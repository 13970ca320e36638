//! Collaborators the engine needs to materialize policy.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lion_core::error::ConstructionError;
use lion_core::Bundle;
use lion_permission::PermissionFactory;

use crate::condition::{ConditionFactory, ConditionRegistry};

/// Resolves a bundle's private data directory.
pub trait DataAreaResolver: Send + Sync {
    fn data_area(&self, bundle: &Bundle) -> Option<PathBuf>;
}

/// Data areas laid out as `<root>/<bundle id>`.
#[derive(Debug, Clone)]
pub struct DataAreaRoot {
    root: PathBuf,
}

impl DataAreaRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataAreaResolver for DataAreaRoot {
    fn data_area(&self, bundle: &Bundle) -> Option<PathBuf> {
        Some(self.root.join(bundle.id().to_string()))
    }
}

/// Receives construction failures of single records.
pub trait ConstructionReporter: Send + Sync {
    fn report(&self, bundle: Option<&Bundle>, record: &str, error: &ConstructionError);
}

/// Reports construction failures as `tracing` warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ConstructionReporter for TracingReporter {
    fn report(&self, bundle: Option<&Bundle>, record: &str, error: &ConstructionError) {
        match bundle {
            Some(bundle) => tracing::warn!(%bundle, record, %error, "Policy record could not be built"),
            None => tracing::warn!(record, %error, "Policy record could not be built"),
        }
    }
}

/// Everything needed to turn records into conditions and permissions.
#[derive(Clone)]
pub struct PolicyContext {
    conditions: Arc<dyn ConditionFactory>,
    permissions: Arc<PermissionFactory>,
    data_area: Option<Arc<dyn DataAreaResolver>>,
    reporter: Arc<dyn ConstructionReporter>,
}

impl PolicyContext {
    pub fn new(conditions: Arc<dyn ConditionFactory>, permissions: Arc<PermissionFactory>) -> Self {
        Self {
            conditions,
            permissions,
            data_area: None,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// A context with the built-in condition and permission types.
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(ConditionRegistry::with_builtin()),
            Arc::new(PermissionFactory::with_builtin()),
        )
    }

    pub fn with_data_area(mut self, resolver: Arc<dyn DataAreaResolver>) -> Self {
        self.data_area = Some(resolver);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ConstructionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn conditions(&self) -> &dyn ConditionFactory {
        self.conditions.as_ref()
    }

    pub fn permissions(&self) -> &PermissionFactory {
        &self.permissions
    }

    pub fn data_area(&self, bundle: &Bundle) -> Option<PathBuf> {
        self.data_area.as_ref().and_then(|resolver| resolver.data_area(bundle))
    }

    pub fn report(&self, bundle: Option<&Bundle>, record: &str, error: &ConstructionError) {
        self.reporter.report(bundle, record, error);
    }
}

impl Default for PolicyContext {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for PolicyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("permissions", &self.permissions)
            .field("data_area", &self.data_area.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_area_root() {
        let bundle = Bundle::new("file:/a.jar");
        let resolver = DataAreaRoot::new("/var/lib/lion");
        assert_eq!(
            resolver.data_area(&bundle),
            Some(PathBuf::from("/var/lib/lion").join(bundle.id().to_string()))
        );

        let context = PolicyContext::builtin();
        assert_eq!(context.data_area(&bundle), None);
        let context = context.with_data_area(Arc::new(resolver));
        assert!(context.data_area(&bundle).is_some());
    }
}
