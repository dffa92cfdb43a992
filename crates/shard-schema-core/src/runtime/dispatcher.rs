// crates/shard-schema-core/src/runtime/dispatcher.rs
// ============================================================================
// Module: Migration Dispatcher
// Description: Control loop that claims shards and drains worker replies.
// Purpose: Roll catalog versions across shards under a runtime ceiling.
// Dependencies: crate::core, crate::interfaces, crossbeam-channel, serde, tracing
// ============================================================================

//! ## Overview
//! Each tick runs three steps in order: compute the throttle ceiling, admit
//! at most one new task when the in-flight count is below the ceiling, then
//! drain worker replies until the reply channel stays quiet for the idle
//! timeout. Storage errors are logged and the affected step is skipped; the
//! loop itself never fails.
//!
//! Invariants:
//! - The in-flight registry holds at most one task per shard.
//! - A task stays in flight from enqueue until its terminal reply.
//! - Claims are released on failed tasks under [`FailurePolicy::Release`]
//!   until a shard fails `max_attempts` times in a row; the claim is then held.
//!
//! Dropping the dispatcher stops admission, waits for every in-flight task to
//! reply, applies those replies to the catalog, and then joins the pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use crossbeam_channel::bounded;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::FromWorker;
use crate::core::Shard;
use crate::core::ShardId;
use crate::core::Task;
use crate::core::TaskKey;
use crate::core::TaskName;
use crate::core::TaskOutcome;
use crate::core::ToWorker;
use crate::interfaces::CatalogStore;
use crate::interfaces::OperationLog;
use crate::interfaces::ShardConnector;
use crate::interfaces::ThrottleSignal;
use crate::runtime::inflight::InFlightRegistry;
use crate::runtime::throttle::ThrottleMonitor;
use crate::runtime::worker::DEFAULT_PT_OSC_PATH;
use crate::runtime::worker::WorkerContext;
use crate::runtime::worker::spawn_workers;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default quiet period that ends a tick's reply drain.
pub const DEFAULT_REPLY_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default consecutive failures tolerated per shard under [`FailurePolicy::Release`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// What happens to a shard's claim when its task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Clear the claim so a later tick retries the shard.
    #[default]
    Release,
    /// Keep the claim until an operator releases it.
    Hold,
}

impl FailurePolicy {
    /// Returns the configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Hold => "hold",
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Worker pool size and hard ceiling.
    pub num_workers: usize,
    /// Claim identifier written to claimed shards and the operation log.
    pub task_name: TaskName,
    /// Quiet period that ends the reply drain.
    pub reply_idle_timeout: Duration,
    /// Claim handling for failed tasks.
    pub failure_policy: FailurePolicy,
    /// Consecutive failures after which a released shard is held instead.
    pub max_attempts: u32,
    /// Program invoked for `pt-osc` versions.
    pub pt_osc_path: PathBuf,
}

impl DispatcherSettings {
    /// Creates settings with default timeout, policy, and tool path.
    #[must_use]
    pub fn new(num_workers: usize, task_name: TaskName) -> Self {
        Self {
            num_workers,
            task_name,
            reply_idle_timeout: DEFAULT_REPLY_IDLE_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pt_osc_path: PathBuf::from(DEFAULT_PT_OSC_PATH),
        }
    }
}

/// Collaborators injected into the dispatcher.
pub struct DispatcherDeps {
    /// Catalog shared by the dispatcher and the workers.
    pub catalog: Arc<dyn CatalogStore>,
    /// Shard connection factory for `sql` versions.
    pub connector: Arc<dyn ShardConnector>,
    /// Throttle signal read once per tick.
    pub throttle: Box<dyn ThrottleSignal>,
}

/// Dispatcher construction errors.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Settings are unusable.
    #[error("invalid dispatcher settings: {0}")]
    Invalid(String),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker pool: {0}")]
    Spawn(String),
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Ceiling in effect for the tick.
    pub ceiling: usize,
    /// Task admitted during the tick, if any.
    pub claimed: Option<TaskKey>,
    /// Replies processed during the drain.
    pub replies: usize,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Single control thread driving the worker pool.
pub struct Dispatcher {
    /// Catalog store.
    catalog: Arc<dyn CatalogStore>,
    /// Tuning.
    settings: DispatcherSettings,
    /// Throttle ceiling tracker.
    throttle: ThrottleMonitor,
    /// Tasks handed to workers.
    in_flight: InFlightRegistry,
    /// Consecutive failed attempts per shard since its last success.
    failures: BTreeMap<ShardId, u32>,
    /// Task queue sender; `None` once shutdown began.
    tasks: Option<Sender<ToWorker>>,
    /// Reply queue receiver.
    replies: Receiver<FromWorker>,
    /// Worker thread handles.
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the worker pool and returns a ready dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DispatcherError`] when settings are invalid or a worker
    /// thread cannot be spawned.
    pub fn new(deps: DispatcherDeps, settings: DispatcherSettings) -> Result<Self, DispatcherError> {
        if settings.num_workers == 0 {
            return Err(DispatcherError::Invalid("num_workers must be at least 1".to_string()));
        }
        if settings.reply_idle_timeout.is_zero() {
            return Err(DispatcherError::Invalid(
                "reply_idle_timeout must be greater than zero".to_string(),
            ));
        }
        if settings.max_attempts == 0 {
            return Err(DispatcherError::Invalid("max_attempts must be at least 1".to_string()));
        }
        let (task_tx, task_rx) = bounded(settings.num_workers);
        let (reply_tx, reply_rx) = bounded(settings.num_workers);
        let oplog: Arc<dyn OperationLog> = deps.catalog.clone();
        let context = WorkerContext {
            oplog,
            connector: deps.connector,
            pt_osc_path: settings.pt_osc_path.clone(),
        };
        let workers = spawn_workers(settings.num_workers, &context, &task_rx, &reply_tx)
            .map_err(|err| DispatcherError::Spawn(err.to_string()))?;
        info!(
            workers = settings.num_workers,
            task_name = %settings.task_name,
            failure_policy = settings.failure_policy.as_str(),
            max_attempts = settings.max_attempts,
            "dispatcher started"
        );
        Ok(Self {
            catalog: deps.catalog,
            throttle: ThrottleMonitor::new(settings.num_workers, deps.throttle),
            settings,
            in_flight: InFlightRegistry::new(),
            failures: BTreeMap::new(),
            tasks: Some(task_tx),
            replies: reply_rx,
            workers,
        })
    }

    /// Returns the in-flight registry.
    #[must_use]
    pub const fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Returns the dispatcher settings.
    #[must_use]
    pub const fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Returns the throttle ceiling in effect after the last tick.
    #[must_use]
    pub const fn ceiling(&self) -> usize {
        self.throttle.ceiling()
    }

    /// Returns the consecutive failed attempts recorded for `shard_id`.
    #[must_use]
    pub fn failed_attempts(&self, shard_id: ShardId) -> u32 {
        self.failures.get(&shard_id).copied().unwrap_or(0)
    }

    /// Runs one tick: ceiling, admission, then reply drain.
    pub fn tick(&mut self) -> TickReport {
        let ceiling = self.throttle.refresh();
        let claimed = if self.in_flight.len() < ceiling { self.admit() } else { None };
        let replies = self.drain_replies();
        TickReport {
            ceiling,
            claimed,
            replies,
        }
    }

    /// Runs ticks until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.tick();
        }
        info!(
            in_flight = self.in_flight.len(),
            ceiling = self.throttle.ceiling(),
            max_workers = self.throttle.max_workers(),
            "dispatcher stopping"
        );
    }

    /// Runs exactly `ticks` ticks and returns their reports.
    pub fn run_for(&mut self, ticks: usize) -> Vec<TickReport> {
        (0 .. ticks).map(|_| self.tick()).collect()
    }

    // ------------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------------

    /// Claims at most one shard and enqueues its next version.
    fn admit(&mut self) -> Option<TaskKey> {
        let max_version = match self.catalog.max_version() {
            Ok(version) => version,
            Err(err) => {
                error!(error = %err, "max version lookup failed; skipping admission");
                return None;
            }
        };
        let shard = match self.catalog.claim_shard_for_upgrade(max_version, &self.settings.task_name)
        {
            Ok(Some(shard)) => shard,
            Ok(None) => {
                debug!(max_version = %max_version, "no shard eligible for upgrade");
                return None;
            }
            Err(err) => {
                error!(error = %err, "shard claim failed; skipping admission");
                return None;
            }
        };
        let version = match self.catalog.next_version(shard.version) {
            Ok(Some(version)) => version,
            Ok(None) => {
                error!(
                    shard_id = %shard.shard_id,
                    shard_version = %shard.version,
                    max_version = %max_version,
                    "claimed shard has no next version; releasing claim"
                );
                self.release(&shard);
                return None;
            }
            Err(err) => {
                error!(shard_id = %shard.shard_id, error = %err, "next version lookup failed; releasing claim");
                self.release(&shard);
                return None;
            }
        };

        let task = Task {
            name: self.settings.task_name.clone(),
            shard,
            version,
        };
        let key = task.key();
        let cmd_type = task.version.cmd_type.to_string();
        if let Err(rejected) = self.in_flight.insert(task.clone()) {
            error!(task = %rejected, "shard already in flight; dropping duplicate claim");
            return None;
        }
        let Some(sender) = &self.tasks else {
            self.abandon(&key, &task.shard, "task channel closed");
            return None;
        };
        match sender.try_send(ToWorker::NewTask(task)) {
            Ok(()) => {
                info!(task = %key, cmd_type = cmd_type.as_str(), "task dispatched");
                Some(key)
            }
            Err(TrySendError::Full(ToWorker::NewTask(task))) => {
                self.abandon(&key, &task.shard, "task queue full");
                None
            }
            Err(TrySendError::Disconnected(ToWorker::NewTask(task))) => {
                self.abandon(&key, &task.shard, "task queue disconnected");
                None
            }
        }
    }

    /// Undoes an admission that could not be enqueued.
    fn abandon(&mut self, key: &TaskKey, shard: &Shard, reason: &str) {
        error!(task = %key, reason, "enqueue failed; releasing claim");
        self.in_flight.remove(key);
        self.release(shard);
    }

    /// Clears this process's claim on `shard`, logging failures.
    fn release(&self, shard: &Shard) {
        if let Err(err) = self.catalog.release_claim(shard.shard_id, &self.settings.task_name) {
            error!(shard_id = %shard.shard_id, error = %err, "claim release failed");
        }
    }

    // ------------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------------

    /// Processes replies until none arrives within the idle timeout.
    fn drain_replies(&mut self) -> usize {
        let mut processed = 0;
        loop {
            match self.replies.recv_timeout(self.settings.reply_idle_timeout) {
                Ok(reply) => {
                    self.handle_reply(reply);
                    processed += 1;
                }
                Err(RecvTimeoutError::Timeout) => return processed,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("reply channel disconnected");
                    return processed;
                }
            }
        }
    }

    /// Applies one worker reply to the catalog and the registry.
    fn handle_reply(&mut self, reply: FromWorker) {
        let FromWorker {
            task,
            outcome,
        } = reply;
        let key = task.key();
        let shard_id = task.shard.shard_id;
        if outcome.is_terminal() {
            self.forget(&key);
        }
        match outcome {
            TaskOutcome::Idle | TaskOutcome::Running => {
                if let Err(err) = self.catalog.update_heartbeat(shard_id, &task.name) {
                    error!(task = %key, error = %err, "heartbeat update failed");
                }
            }
            TaskOutcome::Done => {
                self.failures.remove(&shard_id);
                match self.catalog.mark_upgrade_complete(shard_id, &task.name, task.version.version) {
                    Ok(()) => info!(task = %key, "shard upgraded"),
                    Err(err) => error!(task = %key, error = %err, "upgrade completion failed"),
                }
            }
            TaskOutcome::Failed => match self.settings.failure_policy {
                FailurePolicy::Release => {
                    let attempts = self.failures.entry(shard_id).or_insert(0);
                    *attempts += 1;
                    let attempts = *attempts;
                    if attempts >= self.settings.max_attempts {
                        self.failures.remove(&shard_id);
                        error!(task = %key, attempts, "task failed too many times; holding claim for operator");
                        return;
                    }
                    warn!(task = %key, attempts, "task failed; releasing claim for retry");
                    if let Err(err) = self.catalog.release_claim(shard_id, &task.name) {
                        error!(task = %key, error = %err, "claim release failed");
                    }
                }
                FailurePolicy::Hold => {
                    warn!(task = %key, "task failed; holding claim for operator");
                }
            },
        }
    }

    /// Removes a terminal task from the registry.
    fn forget(&mut self, key: &TaskKey) {
        if self.in_flight.remove(key).is_none() {
            warn!(task = %key, "reply for a task that is not in flight");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Queued tasks still run; their replies must reach the catalog.
        self.tasks = None;
        while !self.in_flight.is_empty() {
            match self.replies.recv() {
                Ok(reply) => self.handle_reply(reply),
                Err(_) => break,
            }
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        if !self.in_flight.is_empty() {
            warn!(in_flight = self.in_flight.len(), "dispatcher dropped with tasks in flight");
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
