//! # maintsync Storage
//!
//! Persistent key-value slots for the maintsync offline queue.
//!
//! A slot is a tiny string store addressed by key, in the spirit of a
//! browser's `localStorage`: the sync engine keeps its whole pending queue
//! as one serialized value under one well-known key. Slots do not interpret
//! the values they hold.
//!
//! ## Design Principles
//!
//! - One `set_item` call replaces the stored value as a whole
//! - A missing key reads as `None`, never as an error
//! - Must be `Send + Sync`; implementations lock internally
//!
//! ## Available Slots
//!
//! - [`InMemorySlot`] - For testing and ephemeral queues
//! - [`FileSlot`] - One file per key, replaced atomically via rename
//!
//! ## Example
//!
//! ```rust
//! use maintsync_storage::{InMemorySlot, KeyValueSlot};
//!
//! let slot = InMemorySlot::new();
//! slot.set_item("queue", "[]").unwrap();
//! assert_eq!(slot.get_item("queue").unwrap().as_deref(), Some("[]"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod slot;

pub use error::{StorageError, StorageResult};
pub use file::FileSlot;
pub use memory::InMemorySlot;
pub use slot::KeyValueSlot;
