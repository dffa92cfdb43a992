// crates/shard-schema-core/src/runtime/mod.rs
// ============================================================================
// Module: Shard Schema Runtime
// Description: Dispatcher loop, worker pool, throttle, and in-memory catalog.
// Purpose: Drive catalog versions across shards.
// Dependencies: crate::{core, interfaces}, crossbeam-channel, tracing
// ============================================================================

//! ## Overview
//! The runtime owns the only moving parts: one dispatcher thread, a fixed
//! worker pool, and the two bounded channels between them. All coordination
//! state lives in the catalog behind the [`crate::interfaces`] contracts.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod dispatcher;
pub mod inflight;
pub mod store;
pub mod throttle;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dispatcher::DEFAULT_MAX_ATTEMPTS;
pub use dispatcher::DEFAULT_REPLY_IDLE_TIMEOUT;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherDeps;
pub use dispatcher::DispatcherError;
pub use dispatcher::DispatcherSettings;
pub use dispatcher::FailurePolicy;
pub use dispatcher::TickReport;
pub use inflight::InFlightRegistry;
pub use store::InMemoryCatalog;
pub use throttle::FileThrottleSignal;
pub use throttle::MAX_THROTTLE_LINE_BYTES;
pub use throttle::ThrottleMonitor;
pub use throttle::clamp_limit;
pub use throttle::parse_limit;
pub use worker::DEFAULT_PT_OSC_PATH;
pub use worker::WorkerContext;
pub use worker::alter_statement;
pub use worker::execute_task;
