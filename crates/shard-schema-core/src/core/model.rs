// crates/shard-schema-core/src/core/model.rs
// ============================================================================
// Module: Shard Schema Catalog Model
// Description: Versions, shards, and operation log rows.
// Purpose: Typed views of the three catalog tables.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! These types mirror the `versions`, `shards`, and `oplog` tables. Versions
//! are authored outside this system and are read-only here. Shards are only
//! mutated through the registry's claim, heartbeat, release, and completion
//! operations. OpLog rows are write-only from the dispatcher's perspective.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ShardId;
use crate::core::identifiers::TaskName;
use crate::core::identifiers::VersionNumber;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Command Types
// ============================================================================

/// How a version's command is applied to a shard.
///
/// # Invariants
/// - Unrecognized catalog labels are preserved in [`CmdType::Unsupported`] so
///   the worker can fail the task visibly instead of dropping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CmdType {
    /// In-process `ALTER TABLE` on the shard connection.
    Sql,
    /// External `pt-online-schema-change` invocation.
    PtOsc,
    /// Any other label found in the catalog.
    Unsupported(String),
}

impl CmdType {
    /// Parses a catalog `cmdType` label.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "sql" => Self::Sql,
            "pt-osc" => Self::PtOsc,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Returns the catalog label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sql => "sql",
            Self::PtOsc => "pt-osc",
            Self::Unsupported(label) => label,
        }
    }
}

impl From<String> for CmdType {
    fn from(label: String) -> Self {
        Self::parse(&label)
    }
}

impl From<CmdType> for String {
    fn from(cmd_type: CmdType) -> Self {
        cmd_type.as_str().to_string()
    }
}

impl fmt::Display for CmdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Catalog Rows
// ============================================================================

/// One migration step from the `versions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Version number (unique, totally ordered).
    pub version: VersionNumber,
    /// DDL fragment (`sql`) or alter spec (`pt-osc`).
    pub command: String,
    /// Table the command applies to.
    pub table_name: String,
    /// How the command is applied.
    pub cmd_type: CmdType,
    /// Last time the row was edited by the authoring process.
    pub last_update: Timestamp,
}

/// One managed database target from the `shards` table.
///
/// # Invariants
/// - `task_name` is `Some` iff a task is in flight for the shard.
/// - The `Debug` rendering never includes `shard_dsn`, which may carry a
///   password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    /// Shard identifier.
    pub shard_id: ShardId,
    /// Schema name on the shard server.
    pub schema_name: String,
    /// Connection descriptor for the shard's own database.
    pub shard_dsn: String,
    /// Currently applied version.
    pub version: VersionNumber,
    /// Claim holder, when claimed.
    pub task_name: Option<TaskName>,
    /// Last heartbeat of the claiming task.
    pub last_task_hb: Option<Timestamp>,
    /// Last time the row was modified.
    pub last_update: Option<Timestamp>,
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("shard_id", &self.shard_id)
            .field("schema_name", &self.schema_name)
            .field("shard_dsn", &"<redacted>")
            .field("version", &self.version)
            .field("task_name", &self.task_name)
            .field("last_task_hb", &self.last_task_hb)
            .field("last_update", &self.last_update)
            .finish()
    }
}

/// A stored operation log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpLogEntry {
    /// Shard the entry refers to.
    pub shard_id: ShardId,
    /// Target version of the task that wrote the entry.
    pub version: VersionNumber,
    /// 1-based sequence within `(shard_id, version)`.
    pub seq: u32,
    /// Task that wrote the entry.
    pub task_name: Option<TaskName>,
    /// Progress or error message.
    pub message: Option<String>,
    /// Captured standard output.
    pub output: Option<String>,
    /// Captured standard error or error detail.
    pub err: Option<String>,
    /// Insert time.
    pub last_update: Option<Timestamp>,
}

/// An operation log row to append; the store assigns `seq` and the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpLogRecord {
    /// Shard the entry refers to.
    pub shard_id: ShardId,
    /// Target version of the task.
    pub version: VersionNumber,
    /// Task writing the entry.
    pub task_name: TaskName,
    /// Progress or error message.
    pub message: String,
    /// Captured standard output (may be empty).
    pub output: String,
    /// Captured standard error or error detail (may be empty).
    pub err: String,
}
