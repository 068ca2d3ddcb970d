//! # maintsync Engine
//!
//! Background synchronization queue for the maintenance-operations
//! dashboard.
//!
//! This crate provides:
//! - Sync tasks with a typed payload per task kind
//! - A durable task store that snapshots the queue into a key-value slot
//! - Connectivity and app-lifecycle sensors
//! - The sync engine: enqueue, periodic drain cycles, bounded retries
//! - An in-memory remote store with upsert semantics
//!
//! ## Architecture
//!
//! Local mutations are enqueued as [`SyncTask`]s and persisted immediately.
//! A drain cycle checks connectivity, then writes each queued task to the
//! remote store in insertion order:
//! 1. Success removes the task
//! 2. Failure bumps its retry count; a task out of budget is dropped
//! 3. The queue is persisted once at the end of the cycle
//!
//! ## Key Invariants
//!
//! - At most one drain cycle runs at a time per engine
//! - Offline cycles are skipped and never consume retry budget
//! - `retry_count <= max_retries` for every queued task
//! - Every queue mutation is persisted; a restart resumes the last pending set
//! - Remote writes are assumed idempotent (upsert by record id)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod remote;
mod sensors;
mod store;
mod task;

pub use config::{SyncConfig, DEFAULT_DRAIN_INTERVAL, DEFAULT_STORAGE_KEY};
pub use engine::{DrainOutcome, DrainReport, SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use remote::{apply, MemoryRemoteStore, RemoteWriter, WriteCall};
pub use sensors::{
    AlwaysOnline, AppState, ConnectivitySensor, ForegroundCallback, LifecycleSensor,
    ManualConnectivity, ManualLifecycle,
};
pub use store::TaskStore;
pub use task::{
    EquipmentRecord, FailureOutcome, MaintenanceRecord, PredictionRecord, ReportRecord, SyncTask,
    TaskId, TaskKind, TaskPayload, DEFAULT_MAX_RETRIES,
};
