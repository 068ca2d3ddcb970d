//! In-memory slot for testing.

use crate::error::{StorageError, StorageResult};
use crate::slot::KeyValueSlot;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// An in-memory key-value slot.
///
/// This slot keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests (share it through an `Arc` to simulate a restart)
/// - Ephemeral queues that don't need persistence
///
/// Writes can be made to fail on demand with [`InMemorySlot::set_fail_writes`]
/// to exercise persistence-failure paths.
///
/// # Example
///
/// ```rust
/// use maintsync_storage::{InMemorySlot, KeyValueSlot};
///
/// let slot = InMemorySlot::new();
/// assert!(slot.get_item("missing").unwrap().is_none());
/// slot.set_item("k", "v").unwrap();
/// assert_eq!(slot.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemorySlot {
    items: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemorySlot {
    /// Creates a new empty in-memory slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot with a pre-existing value.
    ///
    /// Useful for testing recovery from old or corrupt snapshots.
    #[must_use]
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let slot = Self::new();
        slot.items.write().insert(key.into(), value.into());
        slot
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns how many successful `set_item`/`remove_item` calls were made.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected(
                "in-memory slot is failing writes".into(),
            ));
        }
        Ok(())
    }
}

impl KeyValueSlot for InMemorySlot {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.items.write().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.items.write().remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_missing_key_is_none() {
        let slot = InMemorySlot::new();
        assert!(slot.get_item("queue").unwrap().is_none());
        assert_eq!(slot.write_count(), 0);
    }

    #[test]
    fn memory_set_replaces_value() {
        let slot = InMemorySlot::new();
        slot.set_item("queue", "first").unwrap();
        slot.set_item("queue", "second").unwrap();

        assert_eq!(slot.get_item("queue").unwrap().as_deref(), Some("second"));
        assert_eq!(slot.write_count(), 2);
    }

    #[test]
    fn memory_remove_missing_is_ok() {
        let slot = InMemorySlot::with_item("a", "1");
        slot.remove_item("b").unwrap();
        slot.remove_item("a").unwrap();
        assert!(slot.get_item("a").unwrap().is_none());
    }

    #[test]
    fn memory_failing_writes_keep_old_value() {
        let slot = InMemorySlot::with_item("queue", "old");
        slot.set_fail_writes(true);

        let result = slot.set_item("queue", "new");
        assert!(matches!(result, Err(StorageError::WriteRejected(_))));
        assert_eq!(slot.get_item("queue").unwrap().as_deref(), Some("old"));

        slot.set_fail_writes(false);
        slot.set_item("queue", "new").unwrap();
        assert_eq!(slot.get_item("queue").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn memory_shared_through_arc() {
        use std::sync::Arc;

        let slot = Arc::new(InMemorySlot::new());
        let other = Arc::clone(&slot);
        slot.set_item("k", "v").unwrap();
        assert_eq!(other.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
