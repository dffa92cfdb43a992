// crates/shard-schema-core/src/lib.rs
// ============================================================================
// Module: Shard Schema Core Library
// Description: Public API surface for the shard schema dispatcher.
// Purpose: Expose catalog types, seams, and the dispatcher runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Shard schema rolls an ordered catalog of schema versions across many
//! independently versioned database shards. A single dispatcher claims at
//! most one lagging shard per tick, hands it to a bounded worker pool, and
//! records each outcome in the catalog. Storage backends plug in through the
//! traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CatalogError;
pub use interfaces::CatalogStore;
pub use interfaces::OperationLog;
pub use interfaces::ShardConnection;
pub use interfaces::ShardConnectionError;
pub use interfaces::ShardConnector;
pub use interfaces::ShardRegistry;
pub use interfaces::ThrottleSignal;
pub use interfaces::VersionCatalog;
pub use runtime::DEFAULT_MAX_ATTEMPTS;
pub use runtime::DEFAULT_PT_OSC_PATH;
pub use runtime::Dispatcher;
pub use runtime::DispatcherDeps;
pub use runtime::DispatcherError;
pub use runtime::DispatcherSettings;
pub use runtime::FailurePolicy;
pub use runtime::FileThrottleSignal;
pub use runtime::InFlightRegistry;
pub use runtime::InMemoryCatalog;
pub use runtime::ThrottleMonitor;
pub use runtime::TickReport;
pub use runtime::WorkerContext;
