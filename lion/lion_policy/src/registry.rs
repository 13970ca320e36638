//! The conditional policy registry.
//!
//! The registry owns the ordered list of policy entries. Registration order
//! is kept but carries no priority. Evaluation states subscribe to the
//! registry and absorb entries added after they were built on their next
//! query; deletions are not pushed to them.

use std::fmt;
use std::sync::{Arc, Weak};

use lion_core::error::PolicyError;
use parking_lot::{Mutex, RwLock};

use crate::model::{ConditionRecord, PermissionRecord, PolicyEntry};
use crate::store::{InMemoryPolicyStorage, PolicyStorage};

/// Entries registered since a subscriber last drained its inbox.
#[derive(Debug, Default)]
pub(crate) struct EntryInbox {
    queue: Mutex<Vec<Arc<PolicyEntry>>>,
}

impl EntryInbox {
    fn push(&self, entry: Arc<PolicyEntry>) {
        self.queue.lock().push(entry);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub(crate) fn drain(&self) -> Vec<Arc<PolicyEntry>> {
        std::mem::take(&mut *self.queue.lock())
    }
}

/// Ordered, persistent collection of policy entries.
///
/// Lock order is `persist` → `entries` → `subscribers` → inbox.
pub struct PolicyRegistry {
    /// Handed to entries so they can delete themselves.
    this: Weak<PolicyRegistry>,

    entries: RwLock<Vec<Arc<PolicyEntry>>>,

    subscribers: Mutex<Vec<Weak<EntryInbox>>>,

    /// Serializes mutations so saves land in mutation order.
    persist: Mutex<()>,

    storage: Arc<dyn PolicyStorage>,
}

impl PolicyRegistry {
    /// Create an empty registry persisting to `storage`.
    ///
    /// Existing contents of `storage` are replaced on the first mutation; use
    /// [`PolicyRegistry::load`] to start from them.
    pub fn new(storage: Arc<dyn PolicyStorage>) -> Arc<Self> {
        Self::with_entries(storage, Vec::new())
    }

    /// Create an empty registry backed by memory.
    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(InMemoryPolicyStorage::new()))
    }

    /// Load a registry from `storage`.
    ///
    /// # Returns
    ///
    /// * `Ok(registry)` - Every persisted entry decoded and registered.
    /// * `Err(PolicyError)` - The first malformed or duplicate entry; nothing
    ///   is registered.
    pub fn load(storage: Arc<dyn PolicyStorage>) -> Result<Arc<Self>, PolicyError> {
        let mut decoded: Vec<PolicyEntry> = Vec::new();
        for encoded in storage.load()? {
            let entry = PolicyEntry::decode(&encoded)?;
            if let Some(name) = entry.name() {
                if decoded.iter().any(|e| e.name() == Some(name)) {
                    return Err(PolicyError::DuplicateName(name.to_string()));
                }
            }
            decoded.push(entry);
        }

        tracing::info!(entries = decoded.len(), "Loaded conditional policy");
        Ok(Self::with_entries(storage, decoded))
    }

    fn with_entries(storage: Arc<dyn PolicyStorage>, decoded: Vec<PolicyEntry>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<PolicyRegistry>| {
            let entries = decoded
                .iter()
                .map(|entry| Arc::new(entry.attach(this.clone())))
                .collect();
            Self {
                this: this.clone(),
                entries: RwLock::new(entries),
                subscribers: Mutex::new(Vec::new()),
                persist: Mutex::new(()),
                storage,
            }
        })
    }

    /// Register a new entry built from records.
    pub fn add_entry(
        &self,
        conditions: Vec<ConditionRecord>,
        permissions: Vec<PermissionRecord>,
        name: Option<String>,
    ) -> Result<Arc<PolicyEntry>, PolicyError> {
        self.add(&PolicyEntry::new(name, conditions, permissions))
    }

    /// Decode and register an entry.
    pub fn add_encoded(&self, encoded: &str) -> Result<Arc<PolicyEntry>, PolicyError> {
        self.add(&PolicyEntry::decode(encoded)?)
    }

    /// Register a copy of `entry`, persist, and notify subscribers.
    ///
    /// # Returns
    ///
    /// * `Ok(entry)` - The registered entry.
    /// * `Err(PolicyError::Format)` - The entry has a type its encoding
    ///   cannot carry; nothing is persisted.
    /// * `Err(PolicyError::DuplicateName)` - A live entry already has the name.
    /// * `Err(PolicyError::Storage)` - Persisting failed; nothing changed.
    pub fn add(&self, entry: &PolicyEntry) -> Result<Arc<PolicyEntry>, PolicyError> {
        entry.validate()?;
        let _persist = self.persist.lock();

        let entry = Arc::new(entry.attach(self.this.clone()));
        let mut encoded = {
            let entries = self.entries.read();
            if let Some(name) = entry.name() {
                if entries.iter().any(|e| e.name() == Some(name)) {
                    return Err(PolicyError::DuplicateName(name.to_string()));
                }
            }
            Self::encode_all(&entries)
        };
        encoded.push(entry.encode());
        self.storage.save(&encoded)?;

        {
            let mut entries = self.entries.write();
            entries.push(Arc::clone(&entry));
            self.notify(&entry);
        }

        tracing::info!(entry = %entry, "Added policy entry");
        Ok(entry)
    }

    /// Push a new entry to every live subscriber, forgetting dead ones.
    fn notify(&self, entry: &Arc<PolicyEntry>) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|inbox| match inbox.upgrade() {
            Some(inbox) => {
                inbox.push(Arc::clone(entry));
                true
            }
            None => false,
        });
    }

    /// Subscribe to additions and take the current entries, atomically.
    pub(crate) fn subscribe(&self) -> (Arc<EntryInbox>, Vec<Arc<PolicyEntry>>) {
        let entries = self.entries.read();
        let inbox = Arc::new(EntryInbox::default());
        self.subscribers.lock().push(Arc::downgrade(&inbox));
        (inbox, entries.clone())
    }

    /// Snapshot of the current entries, in registration order.
    pub fn enumerate(&self) -> Vec<Arc<PolicyEntry>> {
        self.entries.read().clone()
    }

    /// Look up a live entry by name.
    pub fn get(&self, name: &str) -> Option<Arc<PolicyEntry>> {
        self.entries.read().iter().find(|e| e.name() == Some(name)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete `entry` from the registry.
    ///
    /// Grants already merged into evaluation states are not revoked.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The entry was deleted.
    /// * `Ok(false)` - The entry had already been deleted.
    /// * `Err(PolicyError::EntryNotFound)` - The entry was never registered here.
    pub fn delete(&self, entry: &PolicyEntry) -> Result<bool, PolicyError> {
        let _persist = self.persist.lock();

        if entry.is_deleted() {
            return Ok(false);
        }

        let encoded = {
            let entries = self.entries.read();
            if !entries.iter().any(|e| std::ptr::eq(Arc::as_ptr(e), entry)) {
                return Err(PolicyError::EntryNotFound(entry.encode()));
            }
            entries
                .iter()
                .filter(|e| !std::ptr::eq(Arc::as_ptr(e), entry))
                .map(|e| e.encode())
                .collect::<Vec<_>>()
        };
        self.storage.save(&encoded)?;

        self.entries.write().retain(|e| !std::ptr::eq(Arc::as_ptr(e), entry));
        entry.mark_deleted();

        tracing::info!(entry = %entry, "Deleted policy entry");
        Ok(true)
    }

    /// Delete the live entry called `name`.
    pub fn delete_named(&self, name: &str) -> Result<bool, PolicyError> {
        let entry = self
            .get(name)
            .ok_or_else(|| PolicyError::EntryNotFound(name.to_string()))?;
        self.delete(&entry)
    }

    /// Canonical encodings of the current entries.
    pub fn encoded(&self) -> Vec<String> {
        Self::encode_all(&self.entries.read())
    }

    fn encode_all(entries: &[Arc<PolicyEntry>]) -> Vec<String> {
        entries.iter().map(|e| e.encode()).collect()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("entries", &self.len())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}
