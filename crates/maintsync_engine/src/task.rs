//! Sync tasks: the unit of deferred remote work.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Retry budget used when the caller does not pass one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const ID_SUFFIX_LEN: usize = 9;

/// The closed set of task kinds.
///
/// The kind selects which remote-write operation a task is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// A maintenance report.
    Maintenance,
    /// An equipment create or edit.
    Equipment,
    /// A generated report.
    Report,
    /// A generated failure prediction.
    Prediction,
}

impl TaskKind {
    /// All kinds, in declaration order.
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Maintenance,
        TaskKind::Equipment,
        TaskKind::Report,
        TaskKind::Prediction,
    ];

    /// Returns the lowercase wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Maintenance => "maintenance",
            TaskKind::Equipment => "equipment",
            TaskKind::Report => "report",
            TaskKind::Prediction => "prediction",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A maintenance report row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    /// Remote row id; `None` means insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Equipment the work was done on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    /// Free-text description of the work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remaining columns, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An equipment row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EquipmentRecord {
    /// Remote row id; `None` means insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining columns, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A generated report row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Remote row id; `None` means insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Report title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Remaining columns, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A failure prediction row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Remote row id; `None` means insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Equipment the prediction is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    /// Predicted probability of failure, 0.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_probability: Option<f64>,
    /// Remaining columns, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The payload of a task, one variant per [`TaskKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    /// Create or update a maintenance report.
    Maintenance(MaintenanceRecord),
    /// Create or update an equipment record.
    Equipment(EquipmentRecord),
    /// Create or update a generated report.
    Report(ReportRecord),
    /// Create or update a prediction.
    Prediction(PredictionRecord),
}

impl TaskPayload {
    /// Returns the kind of this payload.
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Maintenance(_) => TaskKind::Maintenance,
            TaskPayload::Equipment(_) => TaskKind::Equipment,
            TaskPayload::Report(_) => TaskKind::Report,
            TaskPayload::Prediction(_) => TaskKind::Prediction,
        }
    }

    /// Returns the remote row id embedded in the payload, if any.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            TaskPayload::Maintenance(r) => r.id.as_deref(),
            TaskPayload::Equipment(r) => r.id.as_deref(),
            TaskPayload::Report(r) => r.id.as_deref(),
            TaskPayload::Prediction(r) => r.id.as_deref(),
        }
    }
}

impl From<MaintenanceRecord> for TaskPayload {
    fn from(record: MaintenanceRecord) -> Self {
        TaskPayload::Maintenance(record)
    }
}

impl From<EquipmentRecord> for TaskPayload {
    fn from(record: EquipmentRecord) -> Self {
        TaskPayload::Equipment(record)
    }
}

impl From<ReportRecord> for TaskPayload {
    fn from(record: ReportRecord) -> Self {
        TaskPayload::Report(record)
    }
}

impl From<PredictionRecord> for TaskPayload {
    fn from(record: PredictionRecord) -> Self {
        TaskPayload::Prediction(record)
    }
}

/// Unique task identifier: `{kind}_{unix_millis}_{random suffix}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh id for a task of `kind` enqueued at `at`.
    pub fn generate(kind: TaskKind, at: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("{}_{}_{}", kind, at.timestamp_millis(), suffix))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// What happened to a task after a failed remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The task stays queued with the new retry count.
    Retry {
        /// Retry count after this failure.
        retry_count: u32,
    },
    /// The retry budget was already spent; the task must be dropped.
    Exhausted,
}

/// A single deferred mutation awaiting remote application.
///
/// Only the retry bookkeeping of a task ever changes after it is created.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTask {
    id: TaskId,
    payload: TaskPayload,
    enqueued_at: DateTime<Utc>,
    retry_count: u32,
    max_retries: u32,
}

impl SyncTask {
    /// Creates a task enqueued now.
    pub fn new(payload: TaskPayload, max_retries: u32) -> Self {
        Self::with_timestamp(payload, max_retries, Utc::now())
    }

    /// Creates a task with an explicit enqueue time.
    pub fn with_timestamp(payload: TaskPayload, max_retries: u32, at: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::generate(payload.kind(), at),
            payload,
            enqueued_at: at,
            retry_count: 0,
            max_retries,
        }
    }

    /// Returns the task id.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the task kind.
    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    /// Returns the payload.
    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    /// Returns when the task was enqueued.
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Returns the number of failed attempts so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns how many more failures the task tolerates before it is dropped.
    pub fn remaining_retries(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }

    /// Records one failed attempt.
    ///
    /// A task with `max_retries = n` survives `n` failures and is exhausted
    /// by failure `n + 1`; `retry_count` never exceeds `max_retries`.
    pub fn record_failure(&mut self) -> FailureOutcome {
        if self.retry_count >= self.max_retries {
            return FailureOutcome::Exhausted;
        }
        self.retry_count += 1;
        FailureOutcome::Retry {
            retry_count: self.retry_count,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum RecordRef<'a> {
    Maintenance(&'a MaintenanceRecord),
    Equipment(&'a EquipmentRecord),
    Report(&'a ReportRecord),
    Prediction(&'a PredictionRecord),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredTaskRef<'a> {
    id: &'a TaskId,
    #[serde(rename = "type")]
    kind: TaskKind,
    payload: RecordRef<'a>,
    enqueued_at: DateTime<Utc>,
    retry_count: u32,
    max_retries: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: TaskId,
    #[serde(rename = "type")]
    kind: TaskKind,
    payload: Value,
    enqueued_at: DateTime<Utc>,
    #[serde(default)]
    retry_count: u32,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Serialize for SyncTask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = match &self.payload {
            TaskPayload::Maintenance(r) => RecordRef::Maintenance(r),
            TaskPayload::Equipment(r) => RecordRef::Equipment(r),
            TaskPayload::Report(r) => RecordRef::Report(r),
            TaskPayload::Prediction(r) => RecordRef::Prediction(r),
        };
        StoredTaskRef {
            id: &self.id,
            kind: self.kind(),
            payload,
            enqueued_at: self.enqueued_at,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SyncTask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredTask::deserialize(deserializer)?;
        let payload = match stored.kind {
            TaskKind::Maintenance => serde_json::from_value(stored.payload).map(TaskPayload::Maintenance),
            TaskKind::Equipment => serde_json::from_value(stored.payload).map(TaskPayload::Equipment),
            TaskKind::Report => serde_json::from_value(stored.payload).map(TaskPayload::Report),
            TaskKind::Prediction => serde_json::from_value(stored.payload).map(TaskPayload::Prediction),
        }
        .map_err(D::Error::custom)?;

        Ok(Self {
            id: stored.id,
            payload,
            enqueued_at: stored.enqueued_at,
            retry_count: stored.retry_count.min(stored.max_retries),
            max_retries: stored.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fridge() -> TaskPayload {
        EquipmentRecord {
            id: Some("temp_42".into()),
            name: Some("Fridge A".into()),
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn task_id_format() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = TaskId::generate(TaskKind::Equipment, at);

        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "equipment");
        assert_eq!(parts[1], "1700000000123");
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn task_ids_are_unique() {
        let at = Utc::now();
        let a = TaskId::generate(TaskKind::Report, at);
        let b = TaskId::generate(TaskKind::Report, at);
        assert_ne!(a, b);
    }

    #[test]
    fn payload_kind_and_record_id() {
        let payload = fridge();
        assert_eq!(payload.kind(), TaskKind::Equipment);
        assert_eq!(payload.record_id(), Some("temp_42"));

        let insert: TaskPayload = MaintenanceRecord::default().into();
        assert_eq!(insert.kind(), TaskKind::Maintenance);
        assert_eq!(insert.record_id(), None);
    }

    #[test]
    fn retry_budget_allows_max_retries_failures() {
        let mut task = SyncTask::new(fridge(), 2);
        assert_eq!(task.remaining_retries(), 2);

        assert_eq!(task.record_failure(), FailureOutcome::Retry { retry_count: 1 });
        assert_eq!(task.record_failure(), FailureOutcome::Retry { retry_count: 2 });
        assert_eq!(task.remaining_retries(), 0);
        assert_eq!(task.record_failure(), FailureOutcome::Exhausted);

        // Exhaustion does not push the counter past the budget
        assert_eq!(task.retry_count(), 2);
    }

    #[test]
    fn zero_budget_exhausts_on_first_failure() {
        let mut task = SyncTask::new(fridge(), 0);
        assert_eq!(task.record_failure(), FailureOutcome::Exhausted);
        assert_eq!(task.retry_count(), 0);
    }

    #[test]
    fn stored_json_shape() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let task = SyncTask::with_timestamp(fridge(), 3, at);

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], "equipment");
        assert_eq!(value["payload"], json!({"id": "temp_42", "name": "Fridge A"}));
        assert_eq!(value["retryCount"], 0);
        assert_eq!(value["maxRetries"], 3);
        assert_eq!(value["id"], task.id().as_str());

        let back: SyncTask = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn unknown_columns_are_preserved() {
        let value = json!({
            "id": "maintenance_1_abc",
            "type": "maintenance",
            "payload": {"equipment_id": "eq-7", "technician": "R. Ortiz", "hours": 2.5},
            "enqueuedAt": "2024-03-01T10:00:00Z",
            "retryCount": 1,
            "maxRetries": 5
        });

        let task: SyncTask = serde_json::from_value(value).unwrap();
        let TaskPayload::Maintenance(record) = task.payload() else {
            panic!("expected maintenance payload");
        };
        assert_eq!(record.equipment_id.as_deref(), Some("eq-7"));
        assert_eq!(record.extra["technician"], "R. Ortiz");
        assert_eq!(record.extra["hours"], 2.5);
        assert_eq!(task.retry_count(), 1);
        assert_eq!(task.max_retries(), 5);
    }

    #[test]
    fn missing_bookkeeping_uses_defaults() {
        let value = json!({
            "id": "report_1_abc",
            "type": "report",
            "payload": {"title": "Q1"},
            "enqueuedAt": "2024-03-01T10:00:00Z"
        });

        let task: SyncTask = serde_json::from_value(value).unwrap();
        assert_eq!(task.retry_count(), 0);
        assert_eq!(task.max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let value = json!({
            "id": "x",
            "type": "invoice",
            "payload": {},
            "enqueuedAt": "2024-03-01T10:00:00Z"
        });
        assert!(serde_json::from_value::<SyncTask>(value).is_err());
    }
}
