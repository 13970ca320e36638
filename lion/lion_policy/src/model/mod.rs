//! Policy data model.
//!
//! Records, entries and their canonical text encoding.

pub(crate) mod encoding;
pub mod entry;
pub mod record;

pub use entry::PolicyEntry;
pub use record::{parse_permission_records, ConditionRecord, PermissionRecord, PolicyItem};
