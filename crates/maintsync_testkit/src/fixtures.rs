//! Queue fixtures and sample payloads.
//!
//! Provides an engine wired to collaborators the test keeps handles to,
//! so network state, remote rows and the persisted slot can all be
//! inspected or changed mid-test.

use async_trait::async_trait;
use maintsync_engine::{
    EquipmentRecord, MaintenanceRecord, ManualConnectivity, MemoryRemoteStore, PredictionRecord,
    RemoteWriter, ReportRecord, SyncConfig, SyncEngine, SyncError, SyncResult, TaskKind,
    TaskPayload,
};
use maintsync_storage::{FileSlot, InMemorySlot, KeyValueSlot};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tempfile::TempDir;

/// Engine type used by [`TestQueue`].
pub type TestEngine =
    SyncEngine<Arc<MemoryRemoteStore>, Arc<ManualConnectivity>, Arc<dyn KeyValueSlot>>;

/// A sync engine plus handles to everything it talks to.
pub struct TestQueue {
    /// The engine under test.
    pub engine: TestEngine,
    /// The remote store the engine writes to.
    pub remote: Arc<MemoryRemoteStore>,
    /// The connectivity sensor (starts connected).
    pub network: Arc<ManualConnectivity>,
    /// The slot holding the persisted queue.
    pub slot: Arc<dyn KeyValueSlot>,
    config: SyncConfig,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestQueue {
    /// Creates a queue over an in-memory slot.
    ///
    /// Enqueue does not drain on its own; call `engine.drain()` explicitly.
    pub fn memory() -> Self {
        Self::with_config(manual_config())
    }

    /// Creates a queue over an in-memory slot with `config`.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::build(config, Arc::new(InMemorySlot::new()), None)
    }

    /// Creates a queue over a file slot in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let slot = FileSlot::open(temp_dir.path()).expect("Failed to open file slot");
        Self::build(manual_config(), Arc::new(slot), Some(temp_dir))
    }

    fn build(config: SyncConfig, slot: Arc<dyn KeyValueSlot>, temp_dir: Option<TempDir>) -> Self {
        let remote = Arc::new(MemoryRemoteStore::new());
        let network = Arc::new(ManualConnectivity::new(true));
        let engine = SyncEngine::new(
            config.clone(),
            Arc::clone(&remote),
            Arc::clone(&network),
            Arc::clone(&slot),
        )
        .expect("Failed to create sync engine");

        Self {
            engine,
            remote,
            network,
            slot,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Simulates a process restart: a fresh engine loads the persisted queue.
    pub fn restart(&mut self) {
        self.engine = SyncEngine::new(
            self.config.clone(),
            Arc::clone(&self.remote),
            Arc::clone(&self.network),
            Arc::clone(&self.slot),
        )
        .expect("Failed to recreate sync engine");
    }

    /// Returns the raw persisted snapshot.
    pub fn persisted(&self) -> Option<String> {
        self.slot
            .get_item(&self.config.storage_key)
            .expect("Failed to read slot")
    }
}

fn manual_config() -> SyncConfig {
    SyncConfig::new().with_drain_on_enqueue(false)
}

/// A maintenance report for `equipment_id`.
pub fn sample_maintenance(equipment_id: &str, description: &str) -> MaintenanceRecord {
    MaintenanceRecord {
        id: None,
        equipment_id: Some(equipment_id.into()),
        description: Some(description.into()),
        ..Default::default()
    }
}

/// An equipment record with an explicit id.
pub fn sample_equipment(id: &str, name: &str) -> EquipmentRecord {
    EquipmentRecord {
        id: Some(id.into()),
        name: Some(name.into()),
        ..Default::default()
    }
}

/// A generated report.
pub fn sample_report(title: &str) -> ReportRecord {
    ReportRecord {
        title: Some(title.into()),
        ..Default::default()
    }
}

/// A prediction for `equipment_id`.
pub fn sample_prediction(equipment_id: &str, probability: f64) -> PredictionRecord {
    let mut record = PredictionRecord {
        equipment_id: Some(equipment_id.into()),
        failure_probability: Some(probability),
        ..Default::default()
    };
    record
        .extra
        .insert("model".into(), serde_json::Value::from("vibration-v2"));
    record
}

/// One payload of every kind, in [`TaskKind::ALL`] order.
pub fn sample_payloads() -> Vec<TaskPayload> {
    vec![
        sample_maintenance("eq-1", "Lubricated spindle").into(),
        sample_equipment("eq-1", "CNC Lathe").into(),
        sample_report("Weekly maintenance summary").into(),
        sample_prediction("eq-1", 0.27).into(),
    ]
}

/// A remote writer that follows a script of outcomes.
///
/// Each call consumes the next entry (`true` = success, `false` = failure);
/// once the script runs out every call succeeds.
#[derive(Debug, Default)]
pub struct ScriptedWriter {
    script: Mutex<VecDeque<bool>>,
    calls: Mutex<Vec<TaskKind>>,
}

impl ScriptedWriter {
    /// Creates a writer following `script`.
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns the kinds written so far, in call order.
    pub fn calls(&self) -> Vec<TaskKind> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next(&self, kind: TaskKind) -> SyncResult<()> {
        self.calls.lock().push(kind);
        match self.script.lock().pop_front() {
            Some(false) => Err(SyncError::remote(kind, "scripted failure")),
            Some(true) | None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteWriter for ScriptedWriter {
    async fn write_maintenance(&self, _record: &MaintenanceRecord) -> SyncResult<()> {
        self.next(TaskKind::Maintenance)
    }

    async fn write_equipment(&self, _record: &EquipmentRecord) -> SyncResult<()> {
        self.next(TaskKind::Equipment)
    }

    async fn write_report(&self, _record: &ReportRecord) -> SyncResult<()> {
        self.next(TaskKind::Report)
    }

    async fn write_prediction(&self, _record: &PredictionRecord) -> SyncResult<()> {
        self.next(TaskKind::Prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maintsync_engine::apply;

    #[test]
    fn memory_queue_restart_keeps_tasks() {
        let mut queue = TestQueue::memory();
        for payload in sample_payloads() {
            queue.engine.enqueue(payload);
        }

        queue.restart();
        assert_eq!(queue.engine.pending_count(), 4);
        assert!(queue.persisted().is_some());
    }

    #[tokio::test]
    async fn file_queue_restart_keeps_tasks() {
        let mut queue = TestQueue::file();
        queue.network.set_connected(false);
        queue.engine.enqueue(sample_report("Q1"));
        queue.engine.enqueue(sample_report("Q2"));

        queue.restart();
        let counts = queue.engine.pending_count_by_type();
        assert_eq!(counts[&TaskKind::Report], 2);

        queue.network.set_connected(true);
        queue.engine.drain().await;
        assert_eq!(queue.remote.row_count(TaskKind::Report), 2);
        assert_eq!(queue.persisted().as_deref(), Some("[]"));
    }

    #[test]
    fn sample_payloads_cover_every_kind() {
        let kinds: Vec<TaskKind> = sample_payloads().iter().map(TaskPayload::kind).collect();
        assert_eq!(kinds, TaskKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn scripted_writer_follows_script() {
        let writer = ScriptedWriter::new([false, true, false]);
        let payload: TaskPayload = sample_report("Q1").into();

        assert!(apply(&writer, &payload).await.is_err());
        assert!(apply(&writer, &payload).await.is_ok());
        assert!(apply(&writer, &payload).await.is_err());
        // Script exhausted
        assert!(apply(&writer, &payload).await.is_ok());
        assert_eq!(writer.call_count(), 4);
    }
}
