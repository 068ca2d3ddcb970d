//! Remote-write seam between the queue and the hosted data store.

use crate::error::{SyncError, SyncResult};
use crate::task::{
    EquipmentRecord, MaintenanceRecord, PredictionRecord, ReportRecord, TaskKind, TaskPayload,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Applies queued records to the remote store.
///
/// There is one operation per [`TaskKind`]. Each performs an upsert keyed by
/// the record's `id` when present and an insert otherwise. Implementations
/// must tolerate being called again with a record a previous, timed-out
/// attempt may already have applied, and should enforce their own request
/// timeout (returning [`SyncError::Timeout`]): the engine waits for every
/// call to finish.
#[async_trait]
pub trait RemoteWriter: Send + Sync {
    /// Writes a maintenance report.
    async fn write_maintenance(&self, record: &MaintenanceRecord) -> SyncResult<()>;

    /// Writes an equipment record.
    async fn write_equipment(&self, record: &EquipmentRecord) -> SyncResult<()>;

    /// Writes a generated report.
    async fn write_report(&self, record: &ReportRecord) -> SyncResult<()>;

    /// Writes a prediction.
    async fn write_prediction(&self, record: &PredictionRecord) -> SyncResult<()>;
}

#[async_trait]
impl<T: RemoteWriter + ?Sized> RemoteWriter for Arc<T> {
    async fn write_maintenance(&self, record: &MaintenanceRecord) -> SyncResult<()> {
        (**self).write_maintenance(record).await
    }

    async fn write_equipment(&self, record: &EquipmentRecord) -> SyncResult<()> {
        (**self).write_equipment(record).await
    }

    async fn write_report(&self, record: &ReportRecord) -> SyncResult<()> {
        (**self).write_report(record).await
    }

    async fn write_prediction(&self, record: &PredictionRecord) -> SyncResult<()> {
        (**self).write_prediction(record).await
    }
}

/// Dispatches `payload` to the writer operation for its kind.
pub async fn apply<W: RemoteWriter + ?Sized>(writer: &W, payload: &TaskPayload) -> SyncResult<()> {
    match payload {
        TaskPayload::Maintenance(record) => writer.write_maintenance(record).await,
        TaskPayload::Equipment(record) => writer.write_equipment(record).await,
        TaskPayload::Report(record) => writer.write_report(record).await,
        TaskPayload::Prediction(record) => writer.write_prediction(record).await,
    }
}

/// One call observed by [`MemoryRemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    /// Kind of the written record.
    pub kind: TaskKind,
    /// Record id, if the payload carried one.
    pub record_id: Option<String>,
    /// Whether the write was applied.
    pub applied: bool,
}

/// An in-memory remote store with upsert semantics.
///
/// Rows are kept per kind, keyed by record id; records without an id are
/// inserted under a generated `row-N` id. Failures can be injected per record
/// id or globally, and every call is recorded for inspection.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    tables: Mutex<HashMap<TaskKind, BTreeMap<String, Value>>>,
    next_row: AtomicU64,
    pending_failures: Mutex<HashMap<String, u32>>,
    fail_all: AtomicBool,
    calls: Mutex<Vec<WriteCall>>,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` writes of the record with `record_id` fail.
    pub fn fail_next(&self, record_id: impl Into<String>, times: u32) {
        self.pending_failures.lock().insert(record_id.into(), times);
    }

    /// Makes every write of the record with `record_id` fail.
    pub fn fail_always(&self, record_id: impl Into<String>) {
        self.fail_next(record_id, u32::MAX);
    }

    /// Makes every write fail (or stops doing so).
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Returns all calls made so far, in order.
    pub fn calls(&self) -> Vec<WriteCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the stored row for `kind` and `id`.
    pub fn row(&self, kind: TaskKind, id: &str) -> Option<Value> {
        self.tables
            .lock()
            .get(&kind)
            .and_then(|rows| rows.get(id).cloned())
    }

    /// Returns the number of rows stored for `kind`.
    pub fn row_count(&self, kind: TaskKind) -> usize {
        self.tables.lock().get(&kind).map_or(0, BTreeMap::len)
    }

    fn should_fail(&self, record_id: Option<&str>) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        let Some(id) = record_id else {
            return false;
        };

        let mut failures = self.pending_failures.lock();
        match failures.get_mut(id) {
            Some(0) | None => false,
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                true
            }
        }
    }

    fn write_row<R: Serialize>(
        &self,
        kind: TaskKind,
        record_id: Option<&str>,
        record: &R,
    ) -> SyncResult<()> {
        let failed = self.should_fail(record_id);
        self.calls.lock().push(WriteCall {
            kind,
            record_id: record_id.map(str::to_string),
            applied: !failed,
        });
        if failed {
            return Err(SyncError::remote(kind, "injected failure"));
        }

        let mut row = serde_json::to_value(record)?;
        let id = match record_id {
            Some(id) => id.to_string(),
            None => {
                let id = format!("row-{}", self.next_row.fetch_add(1, Ordering::SeqCst) + 1);
                if let Value::Object(map) = &mut row {
                    map.insert("id".into(), Value::String(id.clone()));
                }
                id
            }
        };

        self.tables.lock().entry(kind).or_default().insert(id, row);
        Ok(())
    }
}

#[async_trait]
impl RemoteWriter for MemoryRemoteStore {
    async fn write_maintenance(&self, record: &MaintenanceRecord) -> SyncResult<()> {
        self.write_row(TaskKind::Maintenance, record.id.as_deref(), record)
    }

    async fn write_equipment(&self, record: &EquipmentRecord) -> SyncResult<()> {
        self.write_row(TaskKind::Equipment, record.id.as_deref(), record)
    }

    async fn write_report(&self, record: &ReportRecord) -> SyncResult<()> {
        self.write_row(TaskKind::Report, record.id.as_deref(), record)
    }

    async fn write_prediction(&self, record: &PredictionRecord) -> SyncResult<()> {
        self.write_row(TaskKind::Prediction, record.id.as_deref(), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment(id: Option<&str>, name: &str) -> TaskPayload {
        EquipmentRecord {
            id: id.map(str::to_string),
            name: Some(name.into()),
            ..Default::default()
        }
        .into()
    }

    #[tokio::test]
    async fn dispatch_selects_operation_by_kind() {
        let store = MemoryRemoteStore::new();

        apply(&store, &equipment(Some("eq-1"), "Lathe")).await.unwrap();
        apply(
            &store,
            &PredictionRecord {
                id: Some("p-1".into()),
                equipment_id: Some("eq-1".into()),
                failure_probability: Some(0.12),
                ..Default::default()
            }
            .into(),
        )
        .await
        .unwrap();

        assert_eq!(store.row_count(TaskKind::Equipment), 1);
        assert_eq!(store.row_count(TaskKind::Prediction), 1);
        assert_eq!(store.row_count(TaskKind::Maintenance), 0);
        let kinds: Vec<TaskKind> = store.calls().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![TaskKind::Equipment, TaskKind::Prediction]);
    }

    #[tokio::test]
    async fn upsert_by_id_is_idempotent() {
        let store = MemoryRemoteStore::new();

        apply(&store, &equipment(Some("eq-1"), "Lathe")).await.unwrap();
        apply(&store, &equipment(Some("eq-1"), "Lathe")).await.unwrap();
        apply(&store, &equipment(Some("eq-1"), "Lathe (serviced)")).await.unwrap();

        assert_eq!(store.row_count(TaskKind::Equipment), 1);
        let row = store.row(TaskKind::Equipment, "eq-1").unwrap();
        assert_eq!(row["name"], "Lathe (serviced)");
    }

    #[tokio::test]
    async fn insert_without_id_generates_rows() {
        let store = MemoryRemoteStore::new();

        apply(&store, &equipment(None, "Press")).await.unwrap();
        apply(&store, &equipment(None, "Press")).await.unwrap();

        assert_eq!(store.row_count(TaskKind::Equipment), 2);
        let row = store.row(TaskKind::Equipment, "row-1").unwrap();
        assert_eq!(row["id"], "row-1");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryRemoteStore::new();
        store.fail_next("eq-1", 2);

        assert!(apply(&store, &equipment(Some("eq-1"), "Lathe")).await.is_err());
        assert!(apply(&store, &equipment(Some("eq-1"), "Lathe")).await.is_err());
        apply(&store, &equipment(Some("eq-1"), "Lathe")).await.unwrap();

        let applied: Vec<bool> = store.calls().iter().map(|c| c.applied).collect();
        assert_eq!(applied, vec![false, false, true]);
        assert_eq!(store.row_count(TaskKind::Equipment), 1);
    }

    #[tokio::test]
    async fn fail_all_rejects_everything() {
        let store = MemoryRemoteStore::new();
        store.set_fail_all(true);

        let err = apply(&store, &equipment(None, "Press")).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Remote {
                kind: TaskKind::Equipment,
                ..
            }
        ));
        assert_eq!(store.row_count(TaskKind::Equipment), 0);
        assert_eq!(store.call_count(), 1);
    }
}
