// crates/shard-schema-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing, identity, and status output.
// Purpose: Pin the command surface and the fields exposed to operators.
// Dependencies: shard-schema-cli main helpers
// ============================================================================

//! ## Overview
//! Exercises the pure helpers behind the subcommands without spawning the
//! binary.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use clap::Parser;
use shard_schema_core::Shard;
use shard_schema_core::ShardConnectionError;
use shard_schema_core::ShardConnector;
use shard_schema_core::ShardDsn;
use shard_schema_core::ShardId;
use shard_schema_core::TaskName;
use shard_schema_core::Timestamp;
use shard_schema_core::VersionNumber;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ShardsCommand;
use super::status_report;
use crate::identity::resolve_host;
use crate::shards::ShardBackend;
use crate::shards::ShardBackends;
use crate::shards::backend_for;
use crate::telemetry::LogFormat;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn shard(id: u32, version: u32, task_name: Option<&str>) -> Shard {
    Shard {
        shard_id: ShardId::new(id),
        schema_name: format!("shard_{id}"),
        shard_dsn: "app:secret@tcp(db:3306)/".to_string(),
        version: VersionNumber::new(version),
        task_name: task_name.map(TaskName::new),
        last_task_hb: Some(Timestamp::from_unix_millis(1_000)),
        last_update: Some(Timestamp::from_unix_millis(1_000)),
    }
}

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn run_accepts_config_and_tick_limit() {
    let cli = Cli::try_parse_from([
        "shard-schema",
        "--log-format",
        "json",
        "run",
        "--config",
        "/etc/shard-schema.toml",
        "--max-ticks",
        "5",
    ])
    .unwrap();
    assert_eq!(cli.log_format, LogFormat::Json);
    let Commands::Run(command) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(command.max_ticks, Some(5));
    assert_eq!(command.location.config.as_deref(), Some(Path::new("/etc/shard-schema.toml")));
}

#[test]
fn log_format_defaults_to_text_and_is_global() {
    let cli = Cli::try_parse_from(["shard-schema", "status", "--log-format", "text"]).unwrap();
    assert_eq!(cli.log_format, LogFormat::Text);
    let cli = Cli::try_parse_from(["shard-schema", "status"]).unwrap();
    assert_eq!(cli.log_format, LogFormat::Text);
}

#[test]
fn oplog_version_filter_is_optional() {
    let cli = Cli::try_parse_from(["shard-schema", "oplog", "--shard", "7"]).unwrap();
    let Commands::Oplog(command) = cli.command else {
        panic!("expected oplog command");
    };
    assert_eq!(command.shard, 7);
    assert!(command.version.is_none());

    let cli =
        Cli::try_parse_from(["shard-schema", "oplog", "--shard", "7", "--version", "3"]).unwrap();
    let Commands::Oplog(command) = cli.command else {
        panic!("expected oplog command");
    };
    assert_eq!(command.version, Some(3));
}

#[test]
fn nested_subcommands_parse() {
    let cli = Cli::try_parse_from(["shard-schema", "shards", "release", "--shard", "2"]).unwrap();
    let Commands::Shards {
        command: ShardsCommand::Release(command),
    } = cli.command
    else {
        panic!("expected shards release");
    };
    assert_eq!(command.shard, 2);

    let cli = Cli::try_parse_from(["shard-schema", "config", "validate"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommand::Validate(_)
        }
    ));
}

#[test]
fn release_requires_a_shard() {
    assert!(Cli::try_parse_from(["shard-schema", "shards", "release"]).is_err());
}

// ============================================================================
// SECTION: Identity
// ============================================================================

#[test]
fn host_prefers_environment_value() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hostname");
    fs::write(&file, "from-file\n").unwrap();
    assert_eq!(resolve_host(Some(" from-env "), &file), "from-env");
}

#[test]
fn host_falls_back_to_file_then_localhost() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hostname");
    fs::write(&file, "from-file\n").unwrap();
    assert_eq!(resolve_host(Some("  "), &file), "from-file");
    assert_eq!(resolve_host(None, &dir.path().join("absent")), "localhost");
}

// ============================================================================
// SECTION: Status
// ============================================================================

#[test]
fn status_counts_pending_shards_and_hides_dsn() {
    let report = status_report(
        VersionNumber::new(3),
        vec![shard(1, 3, None), shard(2, 2, Some("db-admin:000042")), shard(3, 1, None)],
    );
    assert_eq!(report.pending, 2);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["max_version"], 3);
    assert_eq!(json["shards"][1]["task_name"], "db-admin:000042");
    assert!(!json.to_string().contains("secret"));
    assert!(json["shards"][0].get("shard_dsn").is_none());
}

// ============================================================================
// SECTION: Shard Backends
// ============================================================================

#[test]
fn file_network_routes_to_sqlite_and_others_to_mysql() {
    let backend = |dsn: &str| backend_for(&ShardDsn::parse(dsn).unwrap());
    assert_eq!(backend("app:pw@file(/srv/shards)/"), ShardBackend::Sqlite);
    assert_eq!(backend("app:pw@tcp(10.0.3.87:3306)/"), ShardBackend::MySql);
    assert_eq!(backend("root@unix(/tmp/mysql.sock)/"), ShardBackend::MySql);
    assert_eq!(backend("/"), ShardBackend::MySql);
}

#[test]
fn backends_surface_each_driver_error_as_connect_failure() {
    let backends = ShardBackends::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let connect_error = |dsn: String| {
        let mut target = shard(1, 1, None);
        target.shard_dsn = dsn;
        match backends.connect(&target) {
            Err(ShardConnectionError::Connect(message)) => message,
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("connection unexpectedly succeeded"),
        }
    };

    let sqlite = connect_error(format!("app:pw@file({})/", dir.path().display()));
    assert!(sqlite.contains("shard_1.db"));
    let mysql = connect_error("app:pw@tcp(db1:not-a-port)/".to_string());
    assert!(mysql.contains("invalid port"));
    let malformed = connect_error("app:pw@tcp(db1:3306".to_string());
    assert!(!malformed.contains("pw@"));
}
