// crates/shard-schema-core/src/core/identifiers.rs
// ============================================================================
// Module: Shard Schema Identifiers
// Description: Strongly typed identifiers for shards, versions, and tasks.
// Purpose: Keep catalog keys from being mixed up at call sites.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are thin newtypes over the catalog column values. They
//! serialize transparently so JSON output matches the stored columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Shard identifier (`shards.shardId`).
///
/// # Invariants
/// - Unique and stable for the lifetime of the shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(u32);

impl ShardId {
    /// Creates a shard identifier from its raw column value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Catalog version number (`versions.version`).
///
/// # Invariants
/// - Totally ordered; `0` means "no version applied" and is what an empty
///   catalog reports as its maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// The version reported by an empty catalog.
    pub const ZERO: Self = Self(0);

    /// Creates a version number from its raw column value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw version value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Claim identifier written into `shards.taskName` and `oplog.taskName`.
///
/// # Invariants
/// - Formatted as `<host>:<pid>` by the process bootstrap.
/// - Unique per dispatcher process only while host names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskName(String);

impl TaskName {
    /// Creates a task name from an arbitrary string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Builds the canonical `<host>:<pid>` task name.
    #[must_use]
    pub fn for_process(host: &str, pid: u32) -> Self {
        Self(format!("{host}:{pid:06}"))
    }

    /// Returns the task name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
