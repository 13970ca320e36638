//! Policy persistence.
//!
//! The registry persists itself as an ordered list of encoded entries. The
//! storage backends know nothing about the encoding.

mod file;
mod in_memory;

pub use file::FilePolicyStorage;
pub use in_memory::InMemoryPolicyStorage;

use lion_core::error::PolicyError;

/// Interface for policy persistence.
pub trait PolicyStorage: Send + Sync {
    /// Load the persisted entries, in order.
    fn load(&self) -> Result<Vec<String>, PolicyError>;

    /// Replace the persisted entries.
    fn save(&self, encoded: &[String]) -> Result<(), PolicyError>;
}
