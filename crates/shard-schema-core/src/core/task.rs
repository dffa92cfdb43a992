// crates/shard-schema-core/src/core/task.rs
// ============================================================================
// Module: Shard Schema Tasks and Messages
// Description: In-memory task units and the dispatcher/worker message types.
// Purpose: Give each channel direction a closed set of message variants.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! A [`Task`] is created by the dispatcher when it claims a shard and is
//! moved to exactly one worker through [`ToWorker`]. The worker moves it back
//! inside a [`FromWorker`] reply carrying the outcome. Tasks are never
//! persisted; the catalog only sees their effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::core::identifiers::ShardId;
use crate::core::identifiers::TaskName;
use crate::core::identifiers::VersionNumber;
use crate::core::model::Shard;
use crate::core::model::Version;

// ============================================================================
// SECTION: Tasks
// ============================================================================

/// One unit of dispatched work: apply `version` to `shard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Claim identifier of the dispatching process.
    pub name: TaskName,
    /// Shard snapshot taken at claim time.
    pub shard: Shard,
    /// Version to apply.
    pub version: Version,
}

impl Task {
    /// Returns the in-flight identity of this task.
    #[must_use]
    pub const fn key(&self) -> TaskKey {
        TaskKey {
            shard_id: self.shard.shard_id,
            version: self.version.version,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shard={} version={} ({})",
            self.name, self.shard.shard_id, self.version.version, self.version.cmd_type
        )
    }
}

/// In-flight identity of a task: the shard and its target version.
///
/// # Invariants
/// - Orders by shard first, so all keys of one shard are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    /// Shard being upgraded.
    pub shard_id: ShardId,
    /// Target version.
    pub version: VersionNumber,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard={} version={}", self.shard_id, self.version)
    }
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Messages from the dispatcher to the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToWorker {
    /// Execute the task to completion and reply once.
    NewTask(Task),
}

/// Outcome carried by a worker reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    /// The task completed and the shard is at the target version.
    Done,
    /// Progress report; refreshes the heartbeat. No worker branch emits it yet.
    Running,
    /// The task failed; details are in the operation log.
    Failed,
    /// Worker liveness report; refreshes the heartbeat. No worker branch emits it yet.
    Idle,
}

impl TaskOutcome {
    /// Returns the numeric outcome code logged with each finished task.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Done => 0,
            Self::Running => 1,
            Self::Failed => 2,
            Self::Idle => 3,
        }
    }

    /// Returns true for outcomes that end the task.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Idle => "idle",
        }
    }
}

/// Reply from a worker: the original task plus its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromWorker {
    /// Task exactly as it was handed to the worker.
    pub task: Task,
    /// What happened.
    pub outcome: TaskOutcome,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
