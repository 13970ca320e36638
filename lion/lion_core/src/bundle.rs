//! Bundle identity handle.
//!
//! The framework owns bundle lifecycle; the permission engine only ever sees
//! this small, cheaply clonable handle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::BundleId;

/// Identity of a dynamically loaded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bundle {
    /// Unique bundle identifier.
    id: BundleId,

    /// Install location, e.g. `file:/opt/bundles/report.jar`.
    location: String,

    /// Optional symbolic name.
    symbolic_name: Option<String>,
}

impl Bundle {
    /// Create a bundle handle with a fresh identifier.
    pub fn new(location: impl Into<String>) -> Self {
        Self::with_id(BundleId::new(), location)
    }

    /// Create a bundle handle with a known identifier.
    pub fn with_id(id: BundleId, location: impl Into<String>) -> Self {
        Self {
            id,
            location: location.into(),
            symbolic_name: None,
        }
    }

    /// Attach a symbolic name.
    pub fn with_symbolic_name(mut self, name: impl Into<String>) -> Self {
        self.symbolic_name = Some(name.into());
        self
    }

    pub fn id(&self) -> BundleId {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn symbolic_name(&self) -> Option<&str> {
        self.symbolic_name.as_deref()
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbolic_name {
            Some(name) => write!(f, "{} [{}]", name, self.id),
            None => write!(f, "{} [{}]", self.location, self.id),
        }
    }
}
