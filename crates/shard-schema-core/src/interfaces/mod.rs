// crates/shard-schema-core/src/interfaces/mod.rs
// ============================================================================
// Module: Shard Schema Interfaces
// Description: Backend-agnostic contracts for the catalog, shards, and throttle.
// Purpose: Define the seams the dispatcher and workers are built against.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The catalog is split into three contracts mirroring its tables:
//! [`VersionCatalog`], [`ShardRegistry`], and [`OperationLog`]. Every
//! mutating operation must be a single atomic unit at the storage layer
//! (conditional update plus affected-row check); callers never read then
//! write. Implementations take `&self` and are `Send + Sync` so one store
//! handle can be shared by the dispatcher and all workers.
//!
//! [`ShardConnector`] opens the per-task connection used for `sql` versions,
//! and [`ThrottleSignal`] abstracts the externally editable concurrency
//! limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;

use thiserror::Error;

use crate::core::OpLogRecord;
use crate::core::Shard;
use crate::core::ShardId;
use crate::core::TaskName;
use crate::core::Version;
use crate::core::VersionNumber;

// ============================================================================
// SECTION: Catalog Errors
// ============================================================================

/// Catalog access errors.
///
/// # Invariants
/// - "Nothing to do" results (no claimable shard, no next version) are not
///   errors; they surface as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Store I/O or lock failure.
    #[error("catalog io error: {0}")]
    Io(String),
    /// Storage engine failure.
    #[error("catalog db error: {0}")]
    Db(String),
    /// Point lookup found no row.
    #[error("catalog row not found: {0}")]
    NotFound(String),
    /// A conditional write did not affect exactly one row.
    #[error("catalog conflict: {operation} affected {affected} rows instead of 1")]
    Conflict {
        /// Operation label.
        operation: &'static str,
        /// Rows actually affected.
        affected: usize,
    },
    /// Stored data could not be decoded.
    #[error("catalog invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Version Catalog
// ============================================================================

/// Read-only access to the `versions` table.
pub trait VersionCatalog: Send + Sync {
    /// Returns the highest known version, or [`VersionNumber::ZERO`] for an
    /// empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage failure only.
    fn max_version(&self) -> Result<VersionNumber, CatalogError>;

    /// Returns a version by number.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when no row matches.
    fn version(&self, version: VersionNumber) -> Result<Version, CatalogError>;

    /// Returns the smallest version strictly greater than `after`, or `None`
    /// when `after` is already the maximum.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage failure only.
    fn next_version(&self, after: VersionNumber) -> Result<Option<Version>, CatalogError>;
}

// ============================================================================
// SECTION: Shard Registry
// ============================================================================

/// Claim-state access to the `shards` table.
pub trait ShardRegistry: Send + Sync {
    /// Returns a shard by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the shard does not exist.
    fn shard(&self, shard_id: ShardId) -> Result<Shard, CatalogError>;

    /// Atomically claims the least recently updated unclaimed shard whose
    /// version is below `below`, stamping it with `task_name`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage failure; `Ok(None)` when no shard
    /// is eligible.
    fn claim_shard_for_upgrade(
        &self,
        below: VersionNumber,
        task_name: &TaskName,
    ) -> Result<Option<Shard>, CatalogError>;

    /// Refreshes the heartbeat when the shard is still claimed by `task_name`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] when exactly one row was not
    /// affected (claim lost or shard gone).
    fn update_heartbeat(&self, shard_id: ShardId, task_name: &TaskName)
    -> Result<(), CatalogError>;

    /// Records the new version and clears the claim held by `task_name`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] when exactly one row was not
    /// affected.
    fn mark_upgrade_complete(
        &self,
        shard_id: ShardId,
        task_name: &TaskName,
        new_version: VersionNumber,
    ) -> Result<(), CatalogError>;

    /// Clears the claim held by `task_name` without changing the version.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] when exactly one row was not
    /// affected.
    fn release_claim(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError>;
}

// ============================================================================
// SECTION: Operation Log
// ============================================================================

/// Append-only access to the `oplog` table.
pub trait OperationLog: Send + Sync {
    /// Appends a row with `seq = max(seq) + 1` for `(shard_id, version)` and
    /// returns the assigned sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] when the insert did not create
    /// exactly one row.
    fn append(&self, record: &OpLogRecord) -> Result<u32, CatalogError>;
}

/// Full catalog store: all three table contracts behind one handle.
pub trait CatalogStore: VersionCatalog + ShardRegistry + OperationLog {}

impl<T> CatalogStore for T where T: VersionCatalog + ShardRegistry + OperationLog {}

// ============================================================================
// SECTION: Shard Connections
// ============================================================================

/// Shard connection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardConnectionError {
    /// The connection could not be opened.
    #[error("shard connection failed: {0}")]
    Connect(String),
    /// The statement failed on the shard.
    #[error("shard statement failed: {0}")]
    Execute(String),
}

/// Opens task-scoped connections to shard databases.
pub trait ShardConnector: Send + Sync {
    /// Opens a fresh connection to the shard's own database.
    ///
    /// # Errors
    ///
    /// Returns [`ShardConnectionError::Connect`] when the shard is unreachable.
    fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardConnection>, ShardConnectionError>;
}

/// A connection private to one task; dropping it releases it.
pub trait ShardConnection {
    /// Executes one DDL statement.
    ///
    /// # Errors
    ///
    /// Returns [`ShardConnectionError::Execute`] when the statement fails.
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ShardConnectionError>;
}

// ============================================================================
// SECTION: Throttle Signal
// ============================================================================

/// Source of the externally editable concurrency limit.
pub trait ThrottleSignal: Send {
    /// Returns the first line of the signal, or `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the signal exists but cannot be read.
    fn read_first_line(&self) -> io::Result<Option<String>>;
}
