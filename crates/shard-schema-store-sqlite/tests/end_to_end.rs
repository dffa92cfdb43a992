// crates/shard-schema-store-sqlite/tests/end_to_end.rs
// ============================================================================
// Module: End-to-End Rollout Tests
// Description: Dispatcher, worker pool, SQLite catalog, and SQLite shards.
// Purpose: Verify a full rollout changes real shard schemas and the catalog.
// ============================================================================

//! ## Overview
//! Shards are SQLite files under a temporary directory addressed by
//! `file(<dir>)/` DSNs. `sql` versions run real `ALTER TABLE` statements;
//! `pt-osc` versions run `/bin/echo` in place of the external tool.

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

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use shard_schema_core::CmdType;
use shard_schema_core::Dispatcher;
use shard_schema_core::DispatcherDeps;
use shard_schema_core::DispatcherSettings;
use shard_schema_core::FailurePolicy;
use shard_schema_core::FileThrottleSignal;
use shard_schema_core::Shard;
use shard_schema_core::ShardId;
use shard_schema_core::ShardRegistry;
use shard_schema_core::TaskName;
use shard_schema_core::Timestamp;
use shard_schema_core::Version;
use shard_schema_core::VersionNumber;
use shard_schema_store_sqlite::SqliteCatalogConfig;
use shard_schema_store_sqlite::SqliteCatalogStore;
use shard_schema_store_sqlite::SqliteShardConnector;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct Fixture {
    dir: TempDir,
    store: SqliteCatalogStore,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store =
            SqliteCatalogStore::open(SqliteCatalogConfig::new(dir.path().join("catalog.sqlite")))
                .unwrap();
        store.insert_version(&version(1, "", CmdType::Sql)).unwrap();
        Self {
            dir,
            store,
        }
    }

    fn shard_dir(&self) -> PathBuf {
        let path = self.dir.path().join("shards");
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Creates a shard database with table `t1(id)` and registers it.
    fn add_shard(&self, id: u32) {
        let dir = self.shard_dir();
        let schema = format!("shard_{id}");
        let conn = Connection::open(dir.join(format!("{schema}.db"))).unwrap();
        conn.execute_batch("CREATE TABLE t1 (id INTEGER PRIMARY KEY);").unwrap();
        self.store
            .insert_shard(&Shard {
                shard_id: ShardId::new(id),
                schema_name: schema,
                shard_dsn: format!("app:secret@file({})/", dir.display()),
                version: VersionNumber::new(1),
                task_name: None,
                last_task_hb: None,
                last_update: None,
            })
            .unwrap();
    }

    fn dispatcher(&self, workers: usize, policy: FailurePolicy, pt_osc: &str) -> Dispatcher {
        let mut settings = DispatcherSettings::new(workers, task_name());
        settings.reply_idle_timeout = Duration::from_millis(250);
        settings.failure_policy = policy;
        settings.pt_osc_path = PathBuf::from(pt_osc);
        Dispatcher::new(
            DispatcherDeps {
                catalog: Arc::new(self.store.clone()),
                connector: Arc::new(SqliteShardConnector::new()),
                throttle: Box::new(FileThrottleSignal::new(self.dir.path().join("throttle"))),
            },
            settings,
        )
        .unwrap()
    }

    fn messages(&self, shard_id: u32, at: u32) -> Vec<(u32, String)> {
        self.store
            .list_oplog(ShardId::new(shard_id), Some(VersionNumber::new(at)))
            .unwrap()
            .into_iter()
            .map(|entry| (entry.seq, entry.message.unwrap_or_default()))
            .collect()
    }
}

fn task_name() -> TaskName {
    TaskName::for_process("e2e-host", 31)
}

fn version(number: u32, command: &str, cmd_type: CmdType) -> Version {
    Version {
        version: VersionNumber::new(number),
        command: command.to_string(),
        table_name: "t1".to_string(),
        cmd_type,
        last_update: Timestamp::from_unix_millis(0),
    }
}

fn columns(db: &Path) -> Vec<String> {
    let conn = Connection::open(db).unwrap();
    let mut statement = conn.prepare("SELECT name FROM pragma_table_info('t1')").unwrap();
    statement.query_map([], |row| row.get(0)).unwrap().collect::<Result<_, _>>().unwrap()
}

fn settle(dispatcher: &mut Dispatcher, max_ticks: usize) {
    for _ in 0 .. max_ticks {
        let report = dispatcher.tick();
        if report.claimed.is_none() && report.replies == 0 && dispatcher.in_flight().is_empty() {
            return;
        }
    }
    panic!("rollout did not settle within {max_ticks} ticks");
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[test]
fn sql_version_rolls_out_to_single_shard() {
    let fixture = Fixture::new();
    fixture.store.insert_version(&version(2, "add column x int", CmdType::Sql)).unwrap();
    fixture.add_shard(1);
    let mut dispatcher = fixture.dispatcher(1, FailurePolicy::Release, "/bin/echo");

    settle(&mut dispatcher, 10);

    let shard = fixture.store.shard(ShardId::new(1)).unwrap();
    assert_eq!(shard.version, VersionNumber::new(2));
    assert!(shard.task_name.is_none());
    assert_eq!(
        fixture.messages(1, 2),
        vec![
            (1, "starting SQL command: 'alter table `t1` add column x int'".to_string()),
            (2, "Completed OK".to_string()),
        ]
    );
    let db = fixture.shard_dir().join("shard_1.db");
    assert_eq!(columns(&db), vec!["id".to_string(), "x".to_string()]);
}

#[test]
fn rollout_reaches_every_shard_under_two_workers() {
    let fixture = Fixture::new();
    fixture.store.insert_version(&version(2, "add column x int", CmdType::Sql)).unwrap();
    fixture.store.insert_version(&version(3, "add column y text", CmdType::Sql)).unwrap();
    for id in 1 ..= 3 {
        fixture.add_shard(id);
    }
    let mut dispatcher = fixture.dispatcher(2, FailurePolicy::Release, "/bin/echo");

    settle(&mut dispatcher, 30);

    for shard in fixture.store.list_shards().unwrap() {
        assert_eq!(shard.version, VersionNumber::new(3));
        assert!(shard.task_name.is_none());
        let db = fixture.shard_dir().join(format!("{}.db", shard.schema_name));
        assert_eq!(columns(&db), vec!["id".to_string(), "x".to_string(), "y".to_string()]);
    }
}

#[test]
fn failing_ddl_is_retried_after_release_and_held_otherwise() {
    let fixture = Fixture::new();
    fixture.store.insert_version(&version(2, "add column id int", CmdType::Sql)).unwrap();
    fixture.add_shard(1);

    {
        let mut dispatcher = fixture.dispatcher(1, FailurePolicy::Hold, "/bin/echo");
        dispatcher.run_for(2);
    }
    let held = fixture.store.shard(ShardId::new(1)).unwrap();
    assert_eq!(held.version, VersionNumber::new(1));
    assert_eq!(held.task_name, Some(task_name()));
    let messages = fixture.messages(1, 2);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].1, "Error: ddl error");

    assert_eq!(fixture.store.force_release(ShardId::new(1)).unwrap(), Some(task_name()));
    let mut dispatcher = fixture.dispatcher(1, FailurePolicy::Release, "/bin/echo");
    let report = dispatcher.tick();
    assert!(report.claimed.is_some());
    assert_eq!(report.replies, 1);
    assert!(fixture.store.shard(ShardId::new(1)).unwrap().task_name.is_none());
    assert_eq!(fixture.messages(1, 2).len(), 4);
}

#[test]
fn missing_shard_database_fails_the_task() {
    let fixture = Fixture::new();
    fixture.store.insert_version(&version(2, "add column x int", CmdType::Sql)).unwrap();
    fixture
        .store
        .insert_shard(&Shard {
            shard_id: ShardId::new(9),
            schema_name: "ghost".to_string(),
            shard_dsn: format!("file({})/", fixture.shard_dir().display()),
            version: VersionNumber::new(1),
            task_name: None,
            last_task_hb: None,
            last_update: None,
        })
        .unwrap();
    let mut dispatcher = fixture.dispatcher(1, FailurePolicy::Hold, "/bin/echo");

    dispatcher.run_for(1);

    let messages = fixture.messages(9, 2);
    assert_eq!(messages[1].1, "Error: shard db connection");
    assert!(!fixture.shard_dir().join("ghost.db").exists());
}

#[cfg(unix)]
#[test]
fn pt_osc_version_completes_through_stand_in_tool() {
    let fixture = Fixture::new();
    fixture.store.insert_version(&version(2, "ADD COLUMN z int", CmdType::PtOsc)).unwrap();
    fixture.add_shard(1);
    let mut dispatcher = fixture.dispatcher(1, FailurePolicy::Release, "/bin/echo");

    settle(&mut dispatcher, 10);

    assert_eq!(fixture.store.shard(ShardId::new(1)).unwrap().version, VersionNumber::new(2));
    let entries = fixture.store.list_oplog(ShardId::new(1), Some(VersionNumber::new(2))).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].message.as_deref().unwrap().contains("u=app,p=***,D=shard_1,t=t1"));
    assert_eq!(entries[1].message.as_deref(), Some("Completed OK"));
    assert!(entries[1].output.as_deref().unwrap().contains("--execute --alter ADD COLUMN z int"));
}
