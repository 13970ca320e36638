//! In-memory policy storage.

use std::sync::Arc;

use lion_core::error::PolicyError;
use parking_lot::RwLock;

use super::PolicyStorage;

/// Policy storage held in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyStorage {
    entries: Arc<RwLock<Vec<String>>>,
}

impl InMemoryPolicyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with encoded entries.
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Arc::new(RwLock::new(entries.into_iter().map(Into::into).collect())),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.read().clone()
    }
}

impl PolicyStorage for InMemoryPolicyStorage {
    fn load(&self) -> Result<Vec<String>, PolicyError> {
        Ok(self.snapshot())
    }

    fn save(&self, encoded: &[String]) -> Result<(), PolicyError> {
        *self.entries.write() = encoded.to_vec();
        Ok(())
    }
}
