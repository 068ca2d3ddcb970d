//! Property-based test generators using proptest.
//!
//! Provides strategies for generating queued payloads, retry budgets and
//! remote failure scripts.

use maintsync_engine::{
    EquipmentRecord, MaintenanceRecord, PredictionRecord, ReportRecord, TaskKind, TaskPayload,
};
use proptest::prelude::*;

/// Strategy for generating task kinds.
pub fn task_kind_strategy() -> impl Strategy<Value = TaskKind> {
    prop::sample::select(TaskKind::ALL.to_vec())
}

/// Strategy for generating optional record ids.
pub fn record_id_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::string::string_regex("[a-z]{2,6}_[0-9]{1,4}").expect("Invalid regex"))
}

fn text_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::string::string_regex("[A-Za-z ]{1,24}").expect("Invalid regex"))
}

/// Strategy for generating payloads of any kind.
pub fn payload_strategy() -> impl Strategy<Value = TaskPayload> {
    prop_oneof![
        (record_id_strategy(), record_id_strategy(), text_strategy()).prop_map(
            |(id, equipment_id, description)| {
                TaskPayload::from(MaintenanceRecord {
                    id,
                    equipment_id,
                    description,
                    ..Default::default()
                })
            }
        ),
        (record_id_strategy(), text_strategy()).prop_map(|(id, name)| {
            TaskPayload::from(EquipmentRecord {
                id,
                name,
                ..Default::default()
            })
        }),
        (record_id_strategy(), text_strategy()).prop_map(|(id, title)| {
            TaskPayload::from(ReportRecord {
                id,
                title,
                ..Default::default()
            })
        }),
        (record_id_strategy(), record_id_strategy(), 0.0f64..=1.0).prop_map(
            |(id, equipment_id, probability)| {
                TaskPayload::from(PredictionRecord {
                    id,
                    equipment_id,
                    failure_probability: Some(probability),
                    ..Default::default()
                })
            }
        ),
    ]
}

/// Strategy for generating retry budgets.
pub fn retry_budget_strategy() -> impl Strategy<Value = u32> {
    0u32..=5
}

/// Strategy for generating remote outcomes (`true` = success).
///
/// Failures are weighted heavier so budgets actually run out.
pub fn failure_script_strategy(max_len: usize) -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(prop::bool::weighted(0.35), 0..max_len)
}

/// Strategy for generating a batch of payloads, each with its own budget.
pub fn queued_batch_strategy(
    min_tasks: usize,
    max_tasks: usize,
) -> impl Strategy<Value = Vec<(TaskPayload, u32)>> {
    prop::collection::vec(
        (payload_strategy(), retry_budget_strategy()),
        min_tasks..max_tasks,
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
