// crates/shard-schema-config/src/lib.rs
// ============================================================================
// Module: Shard Schema Config
// Description: Canonical configuration model for the shard schema dispatcher.
// Purpose: Single source of truth for config loading and validation.
// Dependencies: shard-schema-core, shard-schema-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `shard-schema-config` defines the configuration model consumed by the
//! `shard-schema` binary. Loading fails closed: unknown keys, oversized
//! files, and out-of-range values are rejected before any shard is claimed.

pub mod config;

pub use config::*;
