// crates/shard-schema-cli/src/identity.rs
// ============================================================================
// Module: Process Identity
// Description: Host name discovery and `<host>:<pid>` task names.
// Purpose: Give each dispatcher process a claim identifier.
// Dependencies: shard-schema-core
// ============================================================================

//! ## Overview
//! The host name comes from `HOSTNAME`, then the kernel host name file,
//! then `localhost`. Two dispatchers only get distinct task names while
//! their hosts have distinct names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;

use shard_schema_core::TaskName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable consulted first for the host name.
const HOSTNAME_ENV: &str = "HOSTNAME";
/// Kernel-provided host name.
const HOSTNAME_FILE: &str = "/proc/sys/kernel/hostname";
/// Last-resort host name.
const FALLBACK_HOST: &str = "localhost";

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Returns the task name for this process.
pub(crate) fn process_task_name() -> TaskName {
    let host = resolve_host(env::var(HOSTNAME_ENV).ok().as_deref(), Path::new(HOSTNAME_FILE));
    TaskName::for_process(&host, std::process::id())
}

/// Picks the first non-blank host name source.
pub(crate) fn resolve_host(env_value: Option<&str>, host_file: &Path) -> String {
    if let Some(host) = env_value.map(str::trim).filter(|host| !host.is_empty()) {
        return host.to_string();
    }
    if let Ok(content) = fs::read_to_string(host_file) {
        let host = content.trim();
        if !host.is_empty() {
            return host.to_string();
        }
    }
    FALLBACK_HOST.to_string()
}
