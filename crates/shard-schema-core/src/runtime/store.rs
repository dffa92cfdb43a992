// crates/shard-schema-core/src/runtime/store.rs
// ============================================================================
// Module: Shard Schema In-Memory Catalog
// Description: Mutex-guarded catalog for tests and local dry runs.
// Purpose: Provide a deterministic catalog without a database.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryCatalog`] implements every catalog contract over one mutex, so
//! each operation is trivially atomic. Timestamps come from a logical clock
//! that advances on every write, which keeps claim order deterministic.
//! It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::OpLogEntry;
use crate::core::OpLogRecord;
use crate::core::Shard;
use crate::core::ShardId;
use crate::core::TaskName;
use crate::core::Timestamp;
use crate::core::Version;
use crate::core::VersionNumber;
use crate::interfaces::CatalogError;
use crate::interfaces::OperationLog;
use crate::interfaces::ShardRegistry;
use crate::interfaces::VersionCatalog;

// ============================================================================
// SECTION: State
// ============================================================================

/// Tables behind the catalog mutex.
#[derive(Debug, Default)]
struct CatalogState {
    /// Versions keyed by number.
    versions: BTreeMap<VersionNumber, Version>,
    /// Shards keyed by identifier.
    shards: BTreeMap<ShardId, Shard>,
    /// Operation log rows in insertion order.
    oplog: Vec<OpLogEntry>,
    /// Logical clock.
    clock: i64,
}

impl CatalogState {
    /// Advances the logical clock and returns the new time.
    const fn stamp(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp::from_unix_millis(self.clock)
    }

    /// Returns a shard claimed by `task_name`, or a conflict.
    fn claimed_shard(
        &mut self,
        shard_id: ShardId,
        task_name: &TaskName,
        operation: &'static str,
    ) -> Result<&mut Shard, CatalogError> {
        match self.shards.get_mut(&shard_id) {
            Some(shard) if shard.task_name.as_ref() == Some(task_name) => Ok(shard),
            _ => Err(CatalogError::Conflict {
                operation,
                affected: 0,
            }),
        }
    }
}

// ============================================================================
// SECTION: In-Memory Catalog
// ============================================================================

/// In-memory catalog for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    /// Catalog tables protected by a mutex.
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the catalog state.
    fn lock(&self) -> Result<MutexGuard<'_, CatalogState>, CatalogError> {
        self.state.lock().map_err(|_| CatalogError::Io("catalog mutex poisoned".to_string()))
    }

    /// Inserts or replaces a version row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the mutex is poisoned.
    pub fn insert_version(&self, version: Version) -> Result<(), CatalogError> {
        self.lock()?.versions.insert(version.version, version);
        Ok(())
    }

    /// Inserts or replaces a shard row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the mutex is poisoned.
    pub fn insert_shard(&self, shard: Shard) -> Result<(), CatalogError> {
        self.lock()?.shards.insert(shard.shard_id, shard);
        Ok(())
    }

    /// Returns the operation log rows for one shard and version, by `seq`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the mutex is poisoned.
    pub fn oplog_entries(
        &self,
        shard_id: ShardId,
        version: VersionNumber,
    ) -> Result<Vec<OpLogEntry>, CatalogError> {
        let guard = self.lock()?;
        let mut entries: Vec<OpLogEntry> = guard
            .oplog
            .iter()
            .filter(|entry| entry.shard_id == shard_id && entry.version == version)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.seq);
        Ok(entries)
    }
}

impl VersionCatalog for InMemoryCatalog {
    fn max_version(&self) -> Result<VersionNumber, CatalogError> {
        Ok(self.lock()?.versions.keys().next_back().copied().unwrap_or(VersionNumber::ZERO))
    }

    fn version(&self, version: VersionNumber) -> Result<Version, CatalogError> {
        self.lock()?
            .versions
            .get(&version)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("version {version}")))
    }

    fn next_version(&self, after: VersionNumber) -> Result<Option<Version>, CatalogError> {
        let guard = self.lock()?;
        let Some(start) = after.get().checked_add(1) else {
            return Ok(None);
        };
        Ok(guard.versions.range(VersionNumber::new(start) ..).next().map(|(_, version)| version.clone()))
    }
}

impl ShardRegistry for InMemoryCatalog {
    fn shard(&self, shard_id: ShardId) -> Result<Shard, CatalogError> {
        self.lock()?
            .shards
            .get(&shard_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("shard {shard_id}")))
    }

    fn claim_shard_for_upgrade(
        &self,
        below: VersionNumber,
        task_name: &TaskName,
    ) -> Result<Option<Shard>, CatalogError> {
        let mut guard = self.lock()?;
        let candidate = guard
            .shards
            .values()
            .filter(|shard| shard.version < below && shard.task_name.is_none())
            .min_by_key(|shard| (shard.last_update, shard.shard_id))
            .map(|shard| shard.shard_id);
        let Some(shard_id) = candidate else {
            return Ok(None);
        };
        let now = guard.stamp();
        let Some(shard) = guard.shards.get_mut(&shard_id) else {
            return Ok(None);
        };
        shard.task_name = Some(task_name.clone());
        shard.last_task_hb = Some(now);
        shard.last_update = Some(now);
        Ok(Some(shard.clone()))
    }

    fn update_heartbeat(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError> {
        let mut guard = self.lock()?;
        let now = guard.stamp();
        let shard = guard.claimed_shard(shard_id, task_name, "update heartbeat")?;
        shard.last_task_hb = Some(now);
        shard.last_update = Some(now);
        Ok(())
    }

    fn mark_upgrade_complete(
        &self,
        shard_id: ShardId,
        task_name: &TaskName,
        new_version: VersionNumber,
    ) -> Result<(), CatalogError> {
        let mut guard = self.lock()?;
        let now = guard.stamp();
        let shard = guard.claimed_shard(shard_id, task_name, "mark upgrade complete")?;
        shard.version = new_version;
        shard.task_name = None;
        shard.last_task_hb = Some(now);
        shard.last_update = Some(now);
        Ok(())
    }

    fn release_claim(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError> {
        let mut guard = self.lock()?;
        let now = guard.stamp();
        let shard = guard.claimed_shard(shard_id, task_name, "release claim")?;
        shard.task_name = None;
        shard.last_task_hb = Some(now);
        shard.last_update = Some(now);
        Ok(())
    }
}

impl OperationLog for InMemoryCatalog {
    fn append(&self, record: &OpLogRecord) -> Result<u32, CatalogError> {
        let mut guard = self.lock()?;
        let last = guard
            .oplog
            .iter()
            .filter(|entry| entry.shard_id == record.shard_id && entry.version == record.version)
            .map(|entry| entry.seq)
            .max()
            .unwrap_or(0);
        let seq = last.checked_add(1).ok_or_else(|| {
            CatalogError::Invalid(format!(
                "oplog sequence exhausted for shard {} version {}",
                record.shard_id, record.version
            ))
        })?;
        let now = guard.stamp();
        guard.oplog.push(OpLogEntry {
            shard_id: record.shard_id,
            version: record.version,
            seq,
            task_name: Some(record.task_name.clone()),
            message: Some(record.message.clone()),
            output: Some(record.output.clone()),
            err: Some(record.err.clone()),
            last_update: Some(now),
        });
        Ok(seq)
    }
}
