//! Error types for slot operations.

use std::io;
use thiserror::Error;

/// Result type for slot operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a slot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be used to address a slot.
    #[error("invalid slot key {0:?}")]
    InvalidKey(String),

    /// A write was rejected by the slot.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}
