// crates/shard-schema-config/src/config.rs
// ============================================================================
// Module: Shard Schema Configuration
// Description: Configuration loading and validation for the dispatcher.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: shard-schema-core, shard-schema-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file path comes from the caller, then `SHARD_SCHEMA_CONFIG`, then
//! `shard-schema.toml` in the working directory. Every table rejects unknown
//! keys, so a misspelled setting fails the load instead of silently
//! reverting to its default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use shard_schema_core::DEFAULT_MAX_ATTEMPTS;
use shard_schema_core::DEFAULT_PT_OSC_PATH;
use shard_schema_core::DispatcherSettings;
use shard_schema_core::FailurePolicy;
use shard_schema_core::TaskName;
use shard_schema_store_sqlite::SqliteCatalogConfig;
use shard_schema_store_sqlite::SqliteJournalMode;
use shard_schema_store_sqlite::SqliteSyncMode;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "shard-schema.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SHARD_SCHEMA_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default catalog busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of concurrent DDL workers.
const DEFAULT_MAX_CONCURRENT_DDL: i64 = 2;
/// Upper bound on the worker pool size.
pub(crate) const MAX_CONCURRENT_DDL: i64 = 256;
/// Default throttle file location.
pub const DEFAULT_THROTTLING_FILE: &str = "/tmp/ShardSchema_throttle";
/// Default reply drain quiet period (ms).
const DEFAULT_REPLY_IDLE_TIMEOUT_MS: u64 = 1_000;
/// Upper bound on the reply drain quiet period (ms).
pub(crate) const MAX_REPLY_IDLE_TIMEOUT_MS: u64 = 60_000;
/// Maximum task name length in bytes.
pub(crate) const MAX_TASK_NAME_LENGTH: usize = 255;
/// Maximum consecutive failed attempts per shard.
pub(crate) const MAX_ATTEMPTS_LIMIT: u32 = 1_000;

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Shard schema dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardSchemaConfig {
    /// Catalog database settings.
    pub catalog: CatalogConfig,
    /// Dispatcher loop settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// External tool settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl ShardSchemaConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration, normalizing values that have a defined
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.catalog.validate()?;
        self.dispatcher.validate()?;
        self.executor.validate()
    }

    /// Returns the catalog store configuration.
    #[must_use]
    pub fn to_store_config(&self) -> SqliteCatalogConfig {
        self.catalog.to_store_config()
    }

    /// Builds dispatcher settings, preferring the configured task name over
    /// the derived process identity.
    #[must_use]
    pub fn dispatcher_settings(&self, derived: TaskName) -> DispatcherSettings {
        let task_name = self.dispatcher.task_name.clone().map_or(derived, TaskName::new);
        let mut settings = DispatcherSettings::new(self.dispatcher.num_workers(), task_name);
        settings.reply_idle_timeout = Duration::from_millis(self.dispatcher.reply_idle_timeout_ms);
        settings.failure_policy = self.dispatcher.on_failure;
        settings.max_attempts = self.dispatcher.max_attempts;
        settings.pt_osc_path.clone_from(&self.executor.pt_osc_path);
        settings
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// `[catalog]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Catalog database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl CatalogConfig {
    /// Validates catalog settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("catalog.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "catalog.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts to the store's configuration type.
    fn to_store_config(&self) -> SqliteCatalogConfig {
        SqliteCatalogConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// `[dispatcher]` table.
///
/// # Invariants
/// - After [`ShardSchemaConfig::validate`], `max_concurrent_ddl` is within
///   `1 ..= 256`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Worker pool size. Values below one are raised to one.
    #[serde(default = "default_max_concurrent_ddl")]
    pub max_concurrent_ddl: i64,
    /// Throttle file read once per tick.
    #[serde(default = "default_throttling_file")]
    pub throttling_file: PathBuf,
    /// Quiet period that ends each reply drain (ms).
    #[serde(default = "default_reply_idle_timeout_ms")]
    pub reply_idle_timeout_ms: u64,
    /// Claim handling for failed tasks.
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Consecutive failures per shard before a released claim is held.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Optional override of the `<host>:<pid>` identity.
    #[serde(default)]
    pub task_name: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_ddl: DEFAULT_MAX_CONCURRENT_DDL,
            throttling_file: PathBuf::from(DEFAULT_THROTTLING_FILE),
            reply_idle_timeout_ms: DEFAULT_REPLY_IDLE_TIMEOUT_MS,
            on_failure: FailurePolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            task_name: None,
        }
    }
}

impl DispatcherConfig {
    /// Returns the validated worker count.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        let bounded = self.max_concurrent_ddl.clamp(1, MAX_CONCURRENT_DDL);
        usize::try_from(bounded).unwrap_or(1)
    }

    /// Validates and normalizes dispatcher settings.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.max_concurrent_ddl > MAX_CONCURRENT_DDL {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.max_concurrent_ddl must be at most {MAX_CONCURRENT_DDL}"
            )));
        }
        if self.max_concurrent_ddl < 1 {
            warn!(
                configured = self.max_concurrent_ddl,
                "dispatcher.max_concurrent_ddl below one; using one worker"
            );
            self.max_concurrent_ddl = 1;
        }
        validate_path_string("dispatcher.throttling_file", &self.throttling_file.to_string_lossy())?;
        if self.reply_idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.reply_idle_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.reply_idle_timeout_ms > MAX_REPLY_IDLE_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.reply_idle_timeout_ms must be at most {MAX_REPLY_IDLE_TIMEOUT_MS}"
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.max_attempts must be within 1..={MAX_ATTEMPTS_LIMIT}"
            )));
        }
        if let Some(task_name) = &self.task_name {
            if task_name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "dispatcher.task_name must be non-empty".to_string(),
                ));
            }
            if task_name.len() > MAX_TASK_NAME_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "dispatcher.task_name exceeds {MAX_TASK_NAME_LENGTH} bytes"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// `[executor]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Program launched for `pt-osc` versions.
    #[serde(default = "default_pt_osc_path")]
    pub pt_osc_path: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pt_osc_path: default_pt_osc_path(),
        }
    }
}

impl ExecutorConfig {
    /// Validates executor settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("executor.pt_osc_path", &self.pt_osc_path.to_string_lossy())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default catalog busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default worker pool size.
const fn default_max_concurrent_ddl() -> i64 {
    DEFAULT_MAX_CONCURRENT_DDL
}

/// Default throttle file.
fn default_throttling_file() -> PathBuf {
    PathBuf::from(DEFAULT_THROTTLING_FILE)
}

/// Default reply drain quiet period.
const fn default_reply_idle_timeout_ms() -> u64 {
    DEFAULT_REPLY_IDLE_TIMEOUT_MS
}

/// Default failure budget per shard.
const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Default `pt-osc` program.
fn default_pt_osc_path() -> PathBuf {
    PathBuf::from(DEFAULT_PT_OSC_PATH)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        let err = validate_path_string("test_path", "   ").unwrap_err();
        assert!(err.to_string().contains("test_path must be non-empty"));
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let value = format!("dir/{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        assert!(validate_path_string("p", &value).is_err());
        let value = format!("dir/{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH));
        assert!(validate_path_string("p", &value).is_ok());
    }

    #[test]
    fn validate_path_rejects_overlong_path() {
        let path = PathBuf::from("a/".repeat(MAX_TOTAL_PATH_LENGTH / 2 + 1));
        assert!(validate_path(&path).is_err());
    }

    #[test]
    fn resolve_path_prefers_explicit_argument() {
        let resolved = resolve_path(Some(Path::new("explicit.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("explicit.toml"));
    }

    #[test]
    fn num_workers_is_bounded() {
        let low = DispatcherConfig {
            max_concurrent_ddl: -4,
            ..DispatcherConfig::default()
        };
        assert_eq!(low.num_workers(), 1);
        let seven = DispatcherConfig {
            max_concurrent_ddl: 7,
            ..DispatcherConfig::default()
        };
        assert_eq!(seven.num_workers(), 7);
    }
}
