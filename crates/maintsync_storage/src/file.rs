//! File-based slot for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::slot::KeyValueSlot;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A file-based key-value slot.
///
/// Each key maps to one file inside the slot directory. Values survive
/// process restarts.
///
/// # Durability
///
/// `set_item` writes the value to a hidden temporary file, calls
/// `File::sync_all()`, then renames it over the target. A crash leaves
/// either the previous value or the new one, never a torn write.
///
/// # Thread Safety
///
/// Writers are serialized by an internal lock, so the slot can be shared
/// across threads. Every call is blocking file I/O; async callers run it
/// inline on their executor thread.
///
/// # Example
///
/// ```no_run
/// use maintsync_storage::{FileSlot, KeyValueSlot};
/// use std::path::Path;
///
/// let slot = FileSlot::open(Path::new("state")).unwrap();
/// slot.set_item("maintenance_sync_queue", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileSlot {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSlot {
    /// Opens a slot directory, creating it (and its parents) if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the slot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file that holds the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is not a plain file name.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.tmp"))
    }
}

/// Keys become file names, so only a conservative character set is allowed.
fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl KeyValueSlot for FileSlot {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let temp = self.temp_path_for(key);
        let _guard = self.write_lock.lock();

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("slots");

        let slot = FileSlot::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(slot.dir(), path.as_path());
    }

    #[test]
    fn file_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::open(dir.path()).unwrap();
        assert!(slot.get_item("queue").unwrap().is_none());
    }

    #[test]
    fn file_set_and_get() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::open(dir.path()).unwrap();

        slot.set_item("queue", r#"[{"id":"a"}]"#).unwrap();
        assert_eq!(
            slot.get_item("queue").unwrap().as_deref(),
            Some(r#"[{"id":"a"}]"#)
        );
        assert!(!slot.temp_path_for("queue").exists());
    }

    #[test]
    fn file_overwrite_replaces_whole_value() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::open(dir.path()).unwrap();

        slot.set_item("queue", "a much longer first value").unwrap();
        slot.set_item("queue", "short").unwrap();
        assert_eq!(slot.get_item("queue").unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn file_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let slot = FileSlot::open(dir.path()).unwrap();
            slot.set_item("queue", "persisted").unwrap();
        }

        let slot = FileSlot::open(dir.path()).unwrap();
        assert_eq!(slot.get_item("queue").unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn file_remove_item() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::open(dir.path()).unwrap();

        slot.set_item("queue", "x").unwrap();
        slot.remove_item("queue").unwrap();
        assert!(slot.get_item("queue").unwrap().is_none());

        // Removing again is fine
        slot.remove_item("queue").unwrap();
    }

    #[test]
    fn file_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::open(dir.path()).unwrap();

        for key in ["", "../escape", "a/b", ".hidden"] {
            let result = slot.set_item(key, "x");
            assert!(matches!(result, Err(StorageError::InvalidKey(_))), "{key}");
        }
    }
}
