//! Error types for the sync engine.

use crate::task::TaskKind;
use maintsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Every failure of a remote write is treated the same way by the drain
/// cycle: the task is retried on the next cycle until its budget runs out.
/// The variants only exist to make logs and stats readable.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Reading or writing the persisted queue failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The persisted queue could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The remote store rejected or failed a write.
    #[error("remote write failed for {kind} task: {message}")]
    Remote {
        /// Kind of the task being written.
        kind: TaskKind,
        /// Error message.
        message: String,
    },

    /// A remote write exceeded its deadline.
    ///
    /// The engine imposes no timeout of its own; [`RemoteWriter`]
    /// implementations return this when their request deadline expires.
    ///
    /// [`RemoteWriter`]: crate::RemoteWriter
    #[error("remote write timed out")]
    Timeout,

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The periodic worker needs a Tokio runtime.
    #[error("no async runtime available to run the sync worker")]
    NoRuntime,
}

impl SyncError {
    /// Creates a remote write error.
    pub fn remote(kind: TaskKind, message: impl Into<String>) -> Self {
        Self::Remote {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::Timeout;
        assert_eq!(err.to_string(), "remote write timed out");

        let err = SyncError::remote(TaskKind::Equipment, "row violates check constraint");
        assert_eq!(
            err.to_string(),
            "remote write failed for equipment task: row violates check constraint"
        );
    }

    #[test]
    fn storage_error_converts() {
        let err: SyncError = StorageError::InvalidKey("../x".into()).into();
        assert!(matches!(err, SyncError::Storage(_)));
        assert!(err.to_string().contains("../x"));
    }
}
