// crates/shard-schema-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Helpers
// Description: Shared builders for configuration tests.
// Purpose: Parse and validate TOML snippets without touching the filesystem.
// ============================================================================

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

use shard_schema_config::ConfigError;
use shard_schema_config::ShardSchemaConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Smallest valid configuration.
pub const MINIMAL_TOML: &str = r#"
[catalog]
path = "/var/lib/shard-schema/catalog.db"
"#;

/// Parses and validates a TOML snippet.
pub fn config_from_toml(content: &str) -> Result<ShardSchemaConfig, ConfigError> {
    let mut config: ShardSchemaConfig =
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Returns the minimal valid configuration.
pub fn minimal_config() -> Result<ShardSchemaConfig, ConfigError> {
    config_from_toml(MINIMAL_TOML)
}

/// Asserts that a load or validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<ShardSchemaConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
