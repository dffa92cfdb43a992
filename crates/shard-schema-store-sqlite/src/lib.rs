// crates/shard-schema-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Catalog Store
// Description: Durable catalog backend and shard connector using SQLite.
// Purpose: Provide the production persistence for shard schema rollouts.
// Dependencies: shard-schema-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed implementation of the shard schema
//! catalog contracts plus a connector that applies `sql` versions to
//! per-shard SQLite databases. Operator helpers for seeding and inspecting
//! the catalog live on [`SqliteCatalogStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod shard;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use shard::SqliteShardConnector;
pub use store::SqliteCatalogConfig;
pub use store::SqliteCatalogError;
pub use store::SqliteCatalogStore;
pub use store::SqliteJournalMode;
pub use store::SqliteSyncMode;
