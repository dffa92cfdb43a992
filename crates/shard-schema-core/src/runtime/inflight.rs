// crates/shard-schema-core/src/runtime/inflight.rs
// ============================================================================
// Module: In-Flight Registry
// Description: Dispatcher-owned map of tasks handed to workers.
// Purpose: Bound concurrency and keep at most one task per shard.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The registry is keyed by [`TaskKey`] and owned exclusively by the
//! dispatcher thread. Workers never touch it; they only reply.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::ShardId;
use crate::core::Task;
use crate::core::TaskKey;
use crate::core::VersionNumber;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Tasks currently assigned to workers.
///
/// # Invariants
/// - At most one entry per shard.
/// - An entry exists from enqueue until the terminal reply is processed.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    /// Tasks keyed by shard then version.
    tasks: BTreeMap<TaskKey, Task>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task. Returns the task back when its shard already has an
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns the rejected task when the shard is already in flight.
    pub fn insert(&mut self, task: Task) -> Result<(), Box<Task>> {
        if self.contains_shard(task.shard.shard_id) {
            return Err(Box::new(task));
        }
        self.tasks.insert(task.key(), task);
        Ok(())
    }

    /// Removes and returns the entry for `key`.
    pub fn remove(&mut self, key: &TaskKey) -> Option<Task> {
        self.tasks.remove(key)
    }

    /// Returns true when any task for `shard_id` is in flight.
    #[must_use]
    pub fn contains_shard(&self, shard_id: ShardId) -> bool {
        let start = TaskKey {
            shard_id,
            version: VersionNumber::ZERO,
        };
        let end = TaskKey {
            shard_id,
            version: VersionNumber::new(u32::MAX),
        };
        self.tasks.range(start ..= end).next().is_some()
    }

    /// Returns the number of in-flight tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the in-flight keys in shard order.
    #[must_use]
    pub fn keys(&self) -> Vec<TaskKey> {
        self.tasks.keys().copied().collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;
    use crate::core::CmdType;
    use crate::core::Shard;
    use crate::core::TaskName;
    use crate::core::Timestamp;
    use crate::core::Version;

    fn task(shard: u32, version: u32) -> Task {
        Task {
            name: TaskName::new("host:000001"),
            shard: Shard {
                shard_id: ShardId::new(shard),
                schema_name: format!("s{shard}"),
                shard_dsn: "/".to_string(),
                version: VersionNumber::new(version - 1),
                task_name: Some(TaskName::new("host:000001")),
                last_task_hb: None,
                last_update: None,
            },
            version: Version {
                version: VersionNumber::new(version),
                command: "add column x int".to_string(),
                table_name: "t1".to_string(),
                cmd_type: CmdType::Sql,
                last_update: Timestamp::from_unix_millis(0),
            },
        }
    }

    #[test]
    fn rejects_second_task_for_same_shard() {
        let mut registry = InFlightRegistry::new();
        registry.insert(task(1, 2)).unwrap();
        let rejected = registry.insert(task(1, 3)).unwrap_err();
        assert_eq!(rejected.key().version, VersionNumber::new(3));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_shards_coexist_and_remove() {
        let mut registry = InFlightRegistry::new();
        registry.insert(task(2, 2)).unwrap();
        registry.insert(task(1, 5)).unwrap();
        assert_eq!(registry.keys().first().map(|key| key.shard_id), Some(ShardId::new(1)));
        let key = task(2, 2).key();
        assert!(registry.remove(&key).is_some());
        assert!(!registry.contains_shard(ShardId::new(2)));
        assert!(registry.contains_shard(ShardId::new(1)));
        assert!(registry.remove(&key).is_none());
    }
}
