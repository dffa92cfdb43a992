// crates/shard-schema-store-mysql/src/lib.rs
// ============================================================================
// Module: MySQL Shard Store
// Description: Shard connector for MySQL-hosted shard databases.
// Purpose: Run `sql` versions against the database named by a shard row.
// Dependencies: shard-schema-core, mysql_async, tokio
// ============================================================================

//! ## Overview
//! This crate provides [`MySqlShardConnector`], the production
//! [`shard_schema_core::ShardConnector`] for shards reached over `tcp` or
//! `unix` DSNs. The worker pool is synchronous, so the connector drives the
//! async driver on a runtime it owns.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod shard;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use shard::DEFAULT_CONNECT_TIMEOUT;
pub use shard::MySqlShardConnector;
pub use shard::shard_opts;
