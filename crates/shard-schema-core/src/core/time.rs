// crates/shard-schema-core/src/core/time.rs
// ============================================================================
// Module: Shard Schema Time Model
// Description: Timestamp representation for catalog rows.
// Purpose: Carry heartbeat and update times without binding to a clock.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Catalog timestamps are unix epoch milliseconds. Only stores stamp rows;
//! the dispatcher and workers treat timestamps as opaque data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds as stored in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps a raw unix millisecond value.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw unix millisecond value.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Reads the system clock.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(i64::try_from(now.as_millis()).unwrap_or(i64::MAX))
    }
}
