//! Durable task store.
//!
//! The whole queue is kept as one JSON array under a single slot key.
//! Every save overwrites the previous snapshot in one `set_item` call.

use crate::error::SyncResult;
use crate::task::SyncTask;
use maintsync_storage::KeyValueSlot;
use tracing::warn;

/// Persists queue snapshots in a [`KeyValueSlot`].
#[derive(Debug)]
pub struct TaskStore<S: KeyValueSlot> {
    slot: S,
    key: String,
}

impl<S: KeyValueSlot> TaskStore<S> {
    /// Creates a store writing under `key` in `slot`.
    pub fn new(slot: S, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    /// Returns the slot key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the underlying slot.
    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Loads the last saved queue.
    ///
    /// A missing, unreadable or corrupt snapshot yields an empty queue so that
    /// a bad slot never blocks startup.
    pub fn load(&self) -> Vec<SyncTask> {
        match self.try_load() {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unreadable sync queue snapshot");
                Vec::new()
            }
        }
    }

    /// Loads the last saved queue, reporting why a snapshot is unusable.
    pub fn try_load(&self) -> SyncResult<Vec<SyncTask>> {
        match self.slot.get_item(&self.key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Overwrites the snapshot with `tasks`.
    pub fn save(&self, tasks: &[SyncTask]) -> SyncResult<()> {
        let raw = serde_json::to_string(tasks)?;
        self.slot.set_item(&self.key, &raw)?;
        Ok(())
    }
}
