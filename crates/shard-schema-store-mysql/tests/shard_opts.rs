// crates/shard-schema-store-mysql/tests/shard_opts.rs
// ============================================================================
// Module: MySQL Shard Options Tests
// Description: Driver options built from shard DSNs and schema names.
// Purpose: Ensure shard rows resolve to the right server and schema.
// ============================================================================

//! ## Overview
//! These tests never need a live server; the connection case targets a
//! closed local port and only checks the error surface.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use mysql_async::Opts;
use proptest::prelude::*;
use shard_schema_core::Shard;
use shard_schema_core::ShardConnectionError;
use shard_schema_core::ShardConnector;
use shard_schema_core::ShardId;
use shard_schema_core::VersionNumber;
use shard_schema_store_mysql::MySqlShardConnector;
use shard_schema_store_mysql::shard_opts;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn shard(dsn: &str) -> Shard {
    Shard {
        shard_id: ShardId::new(1),
        schema_name: "shard_1".to_string(),
        shard_dsn: dsn.to_string(),
        version: VersionNumber::new(1),
        task_name: None,
        last_task_hb: None,
        last_update: None,
    }
}

fn connect_error(result: Result<Opts, ShardConnectionError>) -> String {
    match result {
        Err(ShardConnectionError::Connect(message)) => message,
        other => panic!("expected a connect error, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

#[test]
fn tcp_dsn_targets_host_port_and_shard_schema() {
    let opts = shard_opts(&shard("app:s3cret@tcp(10.0.3.87:3306)/")).unwrap();
    assert_eq!(opts.ip_or_hostname(), "10.0.3.87");
    assert_eq!(opts.tcp_port(), 3306);
    assert_eq!(opts.user(), Some("app"));
    assert_eq!(opts.pass(), Some("s3cret"));
    assert_eq!(opts.db_name(), Some("shard_1"));
    assert_eq!(opts.socket(), None);
}

#[test]
fn schema_name_wins_over_dsn_database() {
    let opts = shard_opts(&shard("app:pw@tcp(db7:3310)/catalog_db")).unwrap();
    assert_eq!(opts.ip_or_hostname(), "db7");
    assert_eq!(opts.tcp_port(), 3310);
    assert_eq!(opts.db_name(), Some("shard_1"));
}

#[test]
fn bare_dsn_defaults_to_local_server_without_credentials() {
    let opts = shard_opts(&shard("/")).unwrap();
    assert_eq!(opts.ip_or_hostname(), "127.0.0.1");
    assert_eq!(opts.tcp_port(), 3306);
    assert_eq!(opts.user(), None);
    assert_eq!(opts.pass(), None);
}

#[test]
fn unix_dsn_uses_socket_path() {
    let opts = shard_opts(&shard("root@unix(/var/run/mysqld/mysqld.sock)/")).unwrap();
    assert_eq!(opts.socket(), Some("/var/run/mysqld/mysqld.sock"));
    assert_eq!(opts.user(), Some("root"));
    assert_eq!(opts.pass(), None);
}

#[test]
fn unsupported_network_is_a_connect_error() {
    let message = connect_error(shard_opts(&shard("app:pw@file(/srv/shards)/")));
    assert!(message.contains("unsupported network 'file'"));
}

#[test]
fn invalid_port_and_empty_schema_are_rejected() {
    let message = connect_error(shard_opts(&shard("app:pw@tcp(db1:mysql)/")));
    assert!(message.contains("invalid port"));

    let mut unnamed = shard("app:pw@tcp(db1:3306)/");
    unnamed.schema_name = " ".to_string();
    let message = connect_error(shard_opts(&unnamed));
    assert!(message.contains("empty schema name"));
}

#[test]
fn malformed_dsn_error_omits_password() {
    let message = connect_error(shard_opts(&shard("app:hunter2@tcp(db1:3306")));
    assert!(!message.contains("hunter2"));
}

// ============================================================================
// SECTION: Connector
// ============================================================================

#[test]
fn unreachable_shard_fails_with_connect_error() {
    let connector = MySqlShardConnector::new().unwrap();
    let Err(err) = connector.connect(&shard("app:hunter2@tcp(127.0.0.1:1)/?timeout=2s")) else {
        panic!("connection to a closed port succeeded");
    };
    let ShardConnectionError::Connect(message) = err else {
        panic!("expected a connect error");
    };
    assert!(message.starts_with("shard 1 schema shard_1"));
    assert!(!message.contains("hunter2"));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn tcp_host_and_port_round_trip(host in "[a-z][a-z0-9-]{0,20}", port in 1u16 ..) {
        let opts = shard_opts(&shard(&format!("u:p@tcp({host}:{port})/"))).unwrap();
        prop_assert_eq!(opts.ip_or_hostname(), host.as_str());
        prop_assert_eq!(opts.tcp_port(), port);
    }
}
