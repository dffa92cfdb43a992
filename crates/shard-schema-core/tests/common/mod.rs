// crates/shard-schema-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Catalog rows, a recording shard connector, and dispatcher setup.
// Purpose: Share deterministic fixtures across core integration tests.
// Dependencies: shard-schema-core
// ============================================================================

//! ## Overview
//! Fixtures build catalog rows with predictable values and a
//! [`RecordingConnector`] that captures every DDL statement instead of
//! touching a database. [`FaultyCatalog`] injects storage errors into
//! selected catalog calls.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use shard_schema_core::CatalogError;
use shard_schema_core::CatalogStore;
use shard_schema_core::CmdType;
use shard_schema_core::Dispatcher;
use shard_schema_core::DispatcherDeps;
use shard_schema_core::DispatcherSettings;
use shard_schema_core::FailurePolicy;
use shard_schema_core::FileThrottleSignal;
use shard_schema_core::InMemoryCatalog;
use shard_schema_core::OpLogRecord;
use shard_schema_core::OperationLog;
use shard_schema_core::Shard;
use shard_schema_core::ShardConnection;
use shard_schema_core::ShardConnectionError;
use shard_schema_core::ShardConnector;
use shard_schema_core::ShardId;
use shard_schema_core::ShardRegistry;
use shard_schema_core::TaskName;
use shard_schema_core::Timestamp;
use shard_schema_core::Version;
use shard_schema_core::VersionCatalog;
use shard_schema_core::VersionNumber;

// ============================================================================
// SECTION: Catalog Rows
// ============================================================================

/// Task name used by every fixture dispatcher.
pub const TASK_NAME: &str = "testhost:004242";

pub fn task_name() -> TaskName {
    TaskName::new(TASK_NAME)
}

pub fn version(number: u32, table: &str, command: &str, cmd_type: CmdType) -> Version {
    Version {
        version: VersionNumber::new(number),
        command: command.to_string(),
        table_name: table.to_string(),
        cmd_type,
        last_update: Timestamp::from_unix_millis(0),
    }
}

pub fn baseline() -> Version {
    version(1, "", "", CmdType::Sql)
}

pub fn shard(id: u32, at_version: u32, dsn: &str) -> Shard {
    Shard {
        shard_id: ShardId::new(id),
        schema_name: format!("shard_{id}"),
        shard_dsn: dsn.to_string(),
        version: VersionNumber::new(at_version),
        task_name: None,
        last_task_hb: None,
        last_update: None,
    }
}

/// Catalog with the baseline version plus `versions`, and `shards`.
pub fn catalog_with(versions: Vec<Version>, shards: Vec<Shard>) -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.insert_version(baseline()).unwrap();
    for version in versions {
        catalog.insert_version(version).unwrap();
    }
    for shard in shards {
        catalog.insert_shard(shard).unwrap();
    }
    catalog
}

// ============================================================================
// SECTION: Shard Connector
// ============================================================================

/// How the recording connector behaves.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ConnectorMode {
    Succeed,
    RefuseConnect,
    RejectDdl,
}

/// Connector that records statements instead of running them.
#[derive(Clone)]
pub struct RecordingConnector {
    pub mode: ConnectorMode,
    pub statements: Arc<Mutex<Vec<(ShardId, String)>>>,
}

impl RecordingConnector {
    pub fn new(mode: ConnectorMode) -> Self {
        Self {
            mode,
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn executed(&self) -> Vec<(ShardId, String)> {
        self.statements.lock().unwrap().clone()
    }
}

struct RecordingConnection {
    shard_id: ShardId,
    mode: ConnectorMode,
    statements: Arc<Mutex<Vec<(ShardId, String)>>>,
}

impl ShardConnector for RecordingConnector {
    fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardConnection>, ShardConnectionError> {
        if self.mode == ConnectorMode::RefuseConnect {
            return Err(ShardConnectionError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(RecordingConnection {
            shard_id: shard.shard_id,
            mode: self.mode,
            statements: Arc::clone(&self.statements),
        }))
    }
}

impl ShardConnection for RecordingConnection {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ShardConnectionError> {
        if self.mode == ConnectorMode::RejectDdl {
            return Err(ShardConnectionError::Execute("duplicate column name 'x'".to_string()));
        }
        self.statements.lock().unwrap().push((self.shard_id, statement.to_string()));
        Ok(())
    }
}

/// Connector whose statements take `delay` before succeeding.
#[derive(Clone)]
pub struct SlowConnector {
    pub delay: Duration,
    pub inner: RecordingConnector,
}

impl SlowConnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: RecordingConnector::new(ConnectorMode::Succeed),
        }
    }
}

struct SlowConnection {
    delay: Duration,
    inner: Box<dyn ShardConnection>,
}

impl ShardConnector for SlowConnector {
    fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardConnection>, ShardConnectionError> {
        Ok(Box::new(SlowConnection {
            delay: self.delay,
            inner: self.inner.connect(shard)?,
        }))
    }
}

impl ShardConnection for SlowConnection {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ShardConnectionError> {
        thread::sleep(self.delay);
        self.inner.execute_ddl(statement)
    }
}

// ============================================================================
// SECTION: Faulty Catalog
// ============================================================================

/// Catalog calls that [`FaultyCatalog`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CatalogFault {
    MaxVersion,
    Claim,
    Complete,
}

/// In-memory catalog that fails the armed calls.
#[derive(Clone)]
pub struct FaultyCatalog {
    pub inner: InMemoryCatalog,
    faults: Arc<Mutex<BTreeSet<CatalogFault>>>,
}

impl FaultyCatalog {
    pub fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn arm(&self, fault: CatalogFault) {
        self.faults.lock().unwrap().insert(fault);
    }

    pub fn disarm(&self, fault: CatalogFault) {
        self.faults.lock().unwrap().remove(&fault);
    }

    fn check(&self, fault: CatalogFault) -> Result<(), CatalogError> {
        if !self.faults.lock().unwrap().contains(&fault) {
            return Ok(());
        }
        match fault {
            CatalogFault::MaxVersion => Err(CatalogError::Db("versions table unavailable".to_string())),
            CatalogFault::Claim => Err(CatalogError::Io("lock wait timeout".to_string())),
            CatalogFault::Complete => Err(CatalogError::Conflict {
                operation: "mark upgrade complete",
                affected: 0,
            }),
        }
    }
}

impl VersionCatalog for FaultyCatalog {
    fn max_version(&self) -> Result<VersionNumber, CatalogError> {
        self.check(CatalogFault::MaxVersion)?;
        self.inner.max_version()
    }

    fn version(&self, version: VersionNumber) -> Result<Version, CatalogError> {
        self.inner.version(version)
    }

    fn next_version(&self, after: VersionNumber) -> Result<Option<Version>, CatalogError> {
        self.inner.next_version(after)
    }
}

impl ShardRegistry for FaultyCatalog {
    fn shard(&self, shard_id: ShardId) -> Result<Shard, CatalogError> {
        self.inner.shard(shard_id)
    }

    fn claim_shard_for_upgrade(
        &self,
        below: VersionNumber,
        task_name: &TaskName,
    ) -> Result<Option<Shard>, CatalogError> {
        self.check(CatalogFault::Claim)?;
        self.inner.claim_shard_for_upgrade(below, task_name)
    }

    fn update_heartbeat(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError> {
        self.inner.update_heartbeat(shard_id, task_name)
    }

    fn mark_upgrade_complete(
        &self,
        shard_id: ShardId,
        task_name: &TaskName,
        new_version: VersionNumber,
    ) -> Result<(), CatalogError> {
        self.check(CatalogFault::Complete)?;
        self.inner.mark_upgrade_complete(shard_id, task_name, new_version)
    }

    fn release_claim(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError> {
        self.inner.release_claim(shard_id, task_name)
    }
}

impl OperationLog for FaultyCatalog {
    fn append(&self, record: &OpLogRecord) -> Result<u32, CatalogError> {
        self.inner.append(record)
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

pub fn settings(num_workers: usize, policy: FailurePolicy) -> DispatcherSettings {
    let mut settings = DispatcherSettings::new(num_workers, task_name());
    settings.reply_idle_timeout = Duration::from_millis(200);
    settings.failure_policy = policy;
    settings
}

pub fn dispatcher(
    catalog: &InMemoryCatalog,
    connector: &RecordingConnector,
    throttle_path: &Path,
    settings: DispatcherSettings,
) -> Dispatcher {
    Dispatcher::new(
        DispatcherDeps {
            catalog: Arc::new(catalog.clone()),
            connector: Arc::new(connector.clone()),
            throttle: Box::new(FileThrottleSignal::new(throttle_path)),
        },
        settings,
    )
    .unwrap()
}

/// Dispatcher over any catalog store and connector.
pub fn dispatcher_over(
    catalog: Arc<dyn CatalogStore>,
    connector: Arc<dyn ShardConnector>,
    throttle_path: &Path,
    settings: DispatcherSettings,
) -> Dispatcher {
    Dispatcher::new(
        DispatcherDeps {
            catalog,
            connector,
            throttle: Box::new(FileThrottleSignal::new(throttle_path)),
        },
        settings,
    )
    .unwrap()
}

/// Ticks until nothing is in flight and no shard is claimable, or panics.
pub fn run_until_settled(dispatcher: &mut Dispatcher, max_ticks: usize) {
    for _ in 0 .. max_ticks {
        let report = dispatcher.tick();
        if report.claimed.is_none() && report.replies == 0 && dispatcher.in_flight().is_empty() {
            return;
        }
    }
    panic!("dispatcher did not settle within {max_ticks} ticks");
}
