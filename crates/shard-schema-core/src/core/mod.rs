// crates/shard-schema-core/src/core/mod.rs
// ============================================================================
// Module: Shard Schema Core Types
// Description: Catalog rows, identifiers, tasks, and DSN parsing.
// Purpose: Provide stable, serializable types shared by every crate.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types describe the version catalog, the shard registry, the
//! operation log, and the messages exchanged between the dispatcher and its
//! workers.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod dsn;
pub mod identifiers;
pub mod model;
pub mod task;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dsn::DsnError;
pub use dsn::ShardDsn;
pub use identifiers::ShardId;
pub use identifiers::TaskName;
pub use identifiers::VersionNumber;
pub use model::CmdType;
pub use model::OpLogEntry;
pub use model::OpLogRecord;
pub use model::Shard;
pub use model::Version;
pub use task::FromWorker;
pub use task::Task;
pub use task::TaskKey;
pub use task::TaskOutcome;
pub use task::ToWorker;
pub use time::Timestamp;
