//! The sync engine: queue ownership, drain cycles and the periodic worker.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::{self, RemoteWriter};
use crate::sensors::{ConnectivitySensor, LifecycleSensor};
use crate::store::TaskStore;
use crate::task::{FailureOutcome, SyncTask, TaskId, TaskKind, TaskPayload};
use maintsync_storage::KeyValueSlot;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a drain cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every task in the snapshot was attempted.
    Completed,
    /// The queue was empty.
    SkippedEmpty,
    /// Another drain cycle was already running.
    SkippedBusy,
    /// The connectivity sensor reported no network.
    SkippedOffline,
}

impl DrainOutcome {
    /// Returns true if the cycle attempted tasks.
    pub fn is_completed(&self) -> bool {
        matches!(self, DrainOutcome::Completed)
    }
}

/// Result of a drain cycle.
#[derive(Debug, Clone)]
pub struct DrainReport {
    /// How the cycle ended.
    pub outcome: DrainOutcome,
    /// Tasks applied remotely and removed.
    pub succeeded: usize,
    /// Tasks that failed and stay queued.
    pub retried: usize,
    /// Tasks that failed with no retry budget left and were dropped.
    pub dropped: Vec<TaskId>,
    /// Duration of the cycle.
    pub duration: Duration,
}

impl DrainReport {
    fn skipped(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            succeeded: 0,
            retried: 0,
            dropped: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Returns the number of remote writes attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.retried + self.dropped.len()
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Drain cycles that attempted tasks.
    pub cycles_completed: u64,
    /// Drain cycles skipped because the network was down.
    pub cycles_skipped_offline: u64,
    /// Tasks applied remotely.
    pub tasks_succeeded: u64,
    /// Failed remote writes, including the ones that dropped a task.
    pub failed_attempts: u64,
    /// Tasks dropped after exhausting their retry budget.
    pub tasks_dropped: u64,
    /// End of the last completed drain cycle.
    pub last_drain_time: Option<Instant>,
    /// Last remote or persistence error message.
    pub last_error: Option<String>,
}

struct Worker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Clears the draining flag when a cycle ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Shared<W, C, S: KeyValueSlot> {
    config: SyncConfig,
    writer: W,
    connectivity: C,
    store: TaskStore<S>,
    queue: Mutex<Vec<SyncTask>>,
    /// Serializes snapshot writes; taken before the queue lock is released.
    persist_lock: Mutex<()>,
    draining: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl<W, C, S> Shared<W, C, S>
where
    W: RemoteWriter + 'static,
    C: ConnectivitySensor + 'static,
    S: KeyValueSlot + 'static,
{
    /// Saves a snapshot of `queue`, logging instead of failing.
    ///
    /// The slot write happens after the queue lock is released. The write
    /// lock is taken first, so snapshots land in mutation order.
    fn persist(&self, queue: MutexGuard<'_, Vec<SyncTask>>) {
        let snapshot = queue.clone();
        let _write = self.persist_lock.lock();
        drop(queue);

        if let Err(e) = self.store.save(&snapshot) {
            error!(
                key = %self.store.key(),
                pending = snapshot.len(),
                error = %e,
                "failed to persist sync queue; continuing in memory"
            );
            self.stats.write().last_error = Some(e.to_string());
        }
    }

    /// Spawns a drain cycle on the current runtime, falling back to `runtime`.
    fn spawn_drain(self: &Arc<Self>, runtime: Option<&Handle>) {
        let Some(runtime) = Handle::try_current().ok().or_else(|| runtime.cloned()) else {
            debug!("no async runtime, immediate drain skipped");
            return;
        };
        let shared = Arc::clone(self);
        runtime.spawn(async move {
            shared.drain().await;
        });
    }

    async fn drain(&self) -> DrainReport {
        if self.queue.lock().is_empty() {
            debug!("sync queue empty, nothing to drain");
            return DrainReport::skipped(DrainOutcome::SkippedEmpty);
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("drain already in progress");
            return DrainReport::skipped(DrainOutcome::SkippedBusy);
        }
        let _guard = DrainGuard(&self.draining);

        if !self.connectivity.is_connected().await {
            debug!("offline, skipping drain cycle");
            self.stats.write().cycles_skipped_offline += 1;
            return DrainReport::skipped(DrainOutcome::SkippedOffline);
        }

        let start = Instant::now();
        let snapshot: Vec<SyncTask> = self.queue.lock().clone();
        let mut report = DrainReport::skipped(DrainOutcome::Completed);

        for task in &snapshot {
            match remote::apply(&self.writer, task.payload()).await {
                Ok(()) => {
                    self.queue.lock().retain(|t| t.id() != task.id());
                    report.succeeded += 1;
                    debug!(task_id = %task.id(), kind = %task.kind(), "sync task applied");
                }
                Err(e) => self.record_failure(task, &e, &mut report),
            }
        }

        self.persist(self.queue.lock());

        report.duration = start.elapsed();
        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.tasks_succeeded += report.succeeded as u64;
            stats.tasks_dropped += report.dropped.len() as u64;
            stats.last_drain_time = Some(Instant::now());
        }

        debug!(
            succeeded = report.succeeded,
            retried = report.retried,
            dropped = report.dropped.len(),
            "drain cycle finished"
        );
        report
    }

    fn record_failure(&self, task: &SyncTask, err: &SyncError, report: &mut DrainReport) {
        {
            let mut stats = self.stats.write();
            stats.failed_attempts += 1;
            stats.last_error = Some(err.to_string());
        }

        let mut queue = self.queue.lock();
        // The task may have been cleared while its write was in flight.
        let Some(pos) = queue.iter().position(|t| t.id() == task.id()) else {
            return;
        };

        match queue[pos].record_failure() {
            FailureOutcome::Retry { retry_count } => {
                warn!(
                    task_id = %task.id(),
                    kind = %task.kind(),
                    retry_count,
                    max_retries = task.max_retries(),
                    error = %err,
                    "sync task failed, will retry next cycle"
                );
                report.retried += 1;
            }
            FailureOutcome::Exhausted => {
                let dropped = queue.remove(pos);
                error!(
                    task_id = %dropped.id(),
                    kind = %dropped.kind(),
                    max_retries = dropped.max_retries(),
                    error = %err,
                    "sync task exhausted its retry budget and was dropped"
                );
                report.dropped.push(dropped.id().clone());
            }
        }
    }
}

async fn run_worker<W, C, S>(
    shared: Arc<Shared<W, C, S>>,
    interval: Duration,
    cancel: CancellationToken,
) where
    W: RemoteWriter + 'static,
    C: ConnectivitySensor + 'static,
    S: KeyValueSlot + 'static,
{
    info!("sync worker started (interval={interval:?})");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        shared.drain().await;
    }
    info!("sync worker stopped");
}

/// Owns the pending-task queue and keeps it flowing to the remote store.
///
/// Construct one per queue at the application's composition root and hand
/// references to the code that needs to enqueue work. Every mutation of the
/// queue is persisted before the call returns, so a restarted engine resumes
/// with exactly the last known pending set.
///
/// # Example
///
/// ```
/// use maintsync_engine::{AlwaysOnline, EquipmentRecord, MemoryRemoteStore, SyncConfig, SyncEngine};
/// use maintsync_storage::InMemorySlot;
///
/// # block_on(async {
/// let engine = SyncEngine::new(
///     SyncConfig::new().with_drain_on_enqueue(false),
///     MemoryRemoteStore::new(),
///     AlwaysOnline,
///     InMemorySlot::new(),
/// )
/// .unwrap();
///
/// engine.enqueue(EquipmentRecord { name: Some("Fridge A".into()), ..Default::default() });
/// assert_eq!(engine.pending_count(), 1);
///
/// engine.drain().await;
/// assert_eq!(engine.pending_count(), 0);
/// # });
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub struct SyncEngine<W, C, S>
where
    W: RemoteWriter + 'static,
    C: ConnectivitySensor + 'static,
    S: KeyValueSlot + 'static,
{
    shared: Arc<Shared<W, C, S>>,
    worker: Mutex<Option<Worker>>,
}

impl<W, C, S> SyncEngine<W, C, S>
where
    W: RemoteWriter + 'static,
    C: ConnectivitySensor + 'static,
    S: KeyValueSlot + 'static,
{
    /// Creates an engine and restores the queue persisted in `slot`.
    pub fn new(config: SyncConfig, writer: W, connectivity: C, slot: S) -> SyncResult<Self> {
        config.validate()?;

        let store = TaskStore::new(slot, config.storage_key.clone());
        let queue = store.load();
        if !queue.is_empty() {
            info!(pending = queue.len(), "restored pending sync tasks");
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                writer,
                connectivity,
                store,
                queue: Mutex::new(queue),
                persist_lock: Mutex::new(()),
                draining: AtomicBool::new(false),
                stats: RwLock::new(SyncStats::default()),
            }),
            worker: Mutex::new(None),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Gets the remote writer.
    pub fn writer(&self) -> &W {
        &self.shared.writer
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Enqueues `payload` with the configured default retry budget.
    pub fn enqueue(&self, payload: impl Into<TaskPayload>) -> TaskId {
        let max_retries = self.shared.config.default_max_retries;
        self.enqueue_with_retries(payload, max_retries)
    }

    /// Enqueues `payload` with an explicit retry budget.
    ///
    /// The queue is persisted before this returns. Unless disabled in the
    /// configuration, a drain cycle is then spawned on the current Tokio
    /// runtime without waiting for it; if one is already running, the new
    /// task waits for the next cycle. Outside a runtime the task simply
    /// waits for the next drain.
    pub fn enqueue_with_retries(
        &self,
        payload: impl Into<TaskPayload>,
        max_retries: u32,
    ) -> TaskId {
        let task = SyncTask::new(payload.into(), max_retries);
        let id = task.id().clone();
        let kind = task.kind();

        let mut queue = self.shared.queue.lock();
        queue.push(task);
        self.shared.persist(queue);
        debug!(task_id = %id, %kind, max_retries, "sync task enqueued");

        if self.shared.config.drain_on_enqueue {
            self.shared.spawn_drain(None);
        }
        id
    }

    /// Runs one drain cycle.
    ///
    /// Returns immediately if the queue is empty, another cycle is running,
    /// or the network is down. Otherwise every task queued when the cycle
    /// starts is written once, in insertion order.
    pub async fn drain(&self) -> DrainReport {
        self.shared.drain().await
    }

    /// Starts the periodic worker, replacing any running one.
    ///
    /// The worker drains immediately, then every `drain_interval`.
    pub fn start(&self) -> SyncResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_worker(
            Arc::clone(&self.shared),
            self.shared.config.drain_interval,
            cancel.clone(),
        ));

        if let Some(previous) = self.worker.lock().replace(Worker { cancel, task }) {
            previous.cancel.cancel();
        }
        Ok(())
    }

    /// Stops the periodic worker. A cycle already in flight runs to completion.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.cancel.cancel();
        }
    }

    /// Returns true while the periodic worker is running.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.task.is_finished())
    }

    /// Returns true while a drain cycle is in progress.
    pub fn is_draining(&self) -> bool {
        self.shared.draining.load(Ordering::SeqCst)
    }

    /// Attempts a drain whenever `sensor` reports a return to foreground.
    ///
    /// The drain is spawned whether or not the periodic worker is running.
    /// Callbacks fired off the runtime's threads use the runtime that was
    /// current when the sensor was attached.
    pub fn attach_lifecycle<L: LifecycleSensor + ?Sized>(&self, sensor: &L) {
        let shared: Weak<Shared<W, C, S>> = Arc::downgrade(&self.shared);
        let runtime = Handle::try_current().ok();
        sensor.on_foreground(Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                debug!("app returned to foreground");
                shared.spawn_drain(runtime.as_ref());
            }
        }));
    }

    /// Returns the number of pending tasks.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Returns the number of pending tasks per kind; every kind is present.
    pub fn pending_count_by_type(&self) -> BTreeMap<TaskKind, usize> {
        let mut counts: BTreeMap<TaskKind, usize> =
            TaskKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        for task in self.shared.queue.lock().iter() {
            *counts.entry(task.kind()).or_default() += 1;
        }
        counts
    }

    /// Returns a copy of the pending tasks in insertion order.
    pub fn pending_tasks(&self) -> Vec<SyncTask> {
        self.shared.queue.lock().clone()
    }

    /// Drops every pending task and persists the empty queue.
    pub fn clear_all(&self) {
        let mut queue = self.shared.queue.lock();
        let cleared = queue.len();
        queue.clear();
        self.shared.persist(queue);
        info!(cleared, "sync queue cleared");
    }
}

impl<W, C, S> Drop for SyncEngine<W, C, S>
where
    W: RemoteWriter + 'static,
    C: ConnectivitySensor + 'static,
    S: KeyValueSlot + 'static,
{
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}
