// crates/shard-schema-cli/src/telemetry.rs
// ============================================================================
// Module: CLI Telemetry
// Description: Tracing subscriber installation for the shard-schema binary.
// Purpose: Route library diagnostics to stderr in text or JSON form.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! Diagnostics go to stderr so stdout stays reserved for command output.
//! The filter comes from `SHARD_SCHEMA_LOG` and defaults to `info`.
//! Installation happens at most once per process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Once;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the log filter directives.
pub(crate) const LOG_ENV_VAR: &str = "SHARD_SCHEMA_LOG";
/// Filter used when the environment variable is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

/// Guards subscriber installation.
static INIT: Once = Once::new();

// ============================================================================
// SECTION: Types
// ============================================================================

/// Log line encoding.
#[derive(ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Installs the global tracing subscriber. Later calls are no-ops.
pub(crate) fn init_tracing(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr);
        let result = match format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        if let Err(err) = result {
            let _ = writeln!(std::io::stderr(), "tracing init failed: {err}");
        }
    });
}
