//! # maintsync Testkit
//!
//! Test utilities for the maintsync sync queue.
//!
//! This crate provides:
//! - Queue fixtures wiring an engine to inspectable collaborators
//! - Sample payloads for every task kind
//! - A remote writer that follows a scripted list of outcomes
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use maintsync_testkit::prelude::*;
//!
//! let queue = TestQueue::memory();
//! queue.network.set_connected(false);
//! queue.engine.enqueue(sample_equipment("temp_42", "Fridge A"));
//! assert_eq!(queue.engine.pending_count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
