//! Key-value slot trait definition.

use crate::error::StorageResult;
use std::sync::Arc;

/// A persistent string slot addressed by key.
///
/// Slots are **opaque string stores**. The caller owns the format of the
/// values; a slot only guarantees that a value written with `set_item` is
/// returned unchanged by later `get_item` calls, including after a process
/// restart for durable implementations.
///
/// # Invariants
///
/// - `get_item` on a key that was never written returns `Ok(None)`
/// - `set_item` replaces the whole value; readers never observe a mix of
///   the old and new value
/// - `remove_item` on a missing key is not an error
///
/// # Implementors
///
/// - [`super::InMemorySlot`] - For testing
/// - [`super::FileSlot`] - For persistent storage
pub trait KeyValueSlot: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

impl<T: KeyValueSlot + ?Sized> KeyValueSlot for Arc<T> {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        (**self).remove_item(key)
    }
}
