// crates/shard-schema-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Catalog Store
// Description: Durable versions, shards, and oplog tables backed by SQLite.
// Purpose: Serialize shard claims and sequence the operation log on disk.
// Dependencies: shard-schema-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteCatalogStore`] implements every catalog contract over one shared
//! connection. Each mutation is a single statement with an affected-row
//! check, except the claim, which selects and updates inside one
//! `IMMEDIATE` transaction so the write lock is held from the first read.
//! Every update of a shard row also stamps `lastUpdate`, which drives the
//! oldest-first claim order. Timestamps are unix milliseconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use shard_schema_core::CatalogError;
use shard_schema_core::CmdType;
use shard_schema_core::OpLogEntry;
use shard_schema_core::OpLogRecord;
use shard_schema_core::OperationLog;
use shard_schema_core::Shard;
use shard_schema_core::ShardId;
use shard_schema_core::ShardRegistry;
use shard_schema_core::TaskName;
use shard_schema_core::Timestamp;
use shard_schema_core::Version;
use shard_schema_core::VersionCatalog;
use shard_schema_core::VersionNumber;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the catalog.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Column list shared by every shard query.
const SHARD_COLUMNS: &str =
    "shardId, schemaName, shardDSN, version, taskName, lastTaskHb, lastUpdate";
/// Column list shared by every version query.
const VERSION_COLUMNS: &str = "version, command, tableName, cmdType, lastUpdate";
/// Column list shared by every oplog query.
const OPLOG_COLUMNS: &str = "shardId, version, seq, taskName, message, output, err, lastUpdate";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode; lets readers run beside the dispatcher.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteCatalogConfig {
    /// Path to the `SQLite` catalog file.
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

impl SqliteCatalogConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` catalog errors.
#[derive(Debug, Error)]
pub enum SqliteCatalogError {
    /// Store I/O error.
    #[error("sqlite catalog io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite catalog db error: {0}")]
    Db(String),
    /// Catalog schema version mismatch.
    #[error("sqlite catalog version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid catalog data or path.
    #[error("sqlite catalog invalid data: {0}")]
    Invalid(String),
    /// Point lookup found no row.
    #[error("sqlite catalog row not found: {0}")]
    NotFound(String),
    /// A conditional write did not affect exactly one row.
    #[error("sqlite catalog conflict: {operation} affected {affected} rows instead of 1")]
    Conflict {
        /// Operation label.
        operation: &'static str,
        /// Rows actually affected.
        affected: usize,
    },
}

impl From<SqliteCatalogError> for CatalogError {
    fn from(error: SqliteCatalogError) -> Self {
        match error {
            SqliteCatalogError::Io(message) => Self::Io(message),
            SqliteCatalogError::Db(message) => Self::Db(message),
            SqliteCatalogError::VersionMismatch(message) | SqliteCatalogError::Invalid(message) => {
                Self::Invalid(message)
            }
            SqliteCatalogError::NotFound(message) => Self::NotFound(message),
            SqliteCatalogError::Conflict {
                operation,
                affected,
            } => Self::Conflict {
                operation,
                affected,
            },
        }
    }
}

/// Maps an engine error.
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err adapter.")]
fn db(err: rusqlite::Error) -> SqliteCatalogError {
    SqliteCatalogError::Db(err.to_string())
}

/// Fails unless exactly one row was affected.
const fn expect_one(operation: &'static str, affected: usize) -> Result<(), SqliteCatalogError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(SqliteCatalogError::Conflict {
            operation,
            affected,
        })
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    /// Store configuration.
    config: SqliteCatalogConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Opens the catalog, creating the file and schema when missing.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError`] when the database cannot be opened or
    /// initialized, or its schema version is unknown.
    pub fn open(config: SqliteCatalogConfig) -> Result<Self, SqliteCatalogError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        debug!(path = %config.path.display(), "catalog opened");
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the catalog file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteCatalogError> {
        self.connection.lock().map_err(|_| SqliteCatalogError::Io("mutex poisoned".to_string()))
    }

    // ------------------------------------------------------------------------
    // Admin helpers
    // ------------------------------------------------------------------------

    /// Inserts a version row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError::Db`] when the version already exists.
    pub fn insert_version(&self, version: &Version) -> Result<(), SqliteCatalogError> {
        let affected = self
            .lock()?
            .execute(
                "INSERT INTO versions (version, command, tableName, cmdType, lastUpdate) VALUES \
                 (?1, ?2, ?3, ?4, ?5)",
                params![
                    version.version.get(),
                    version.command,
                    version.table_name,
                    version.cmd_type.as_str(),
                    version.last_update.as_unix_millis()
                ],
            )
            .map_err(db)?;
        expect_one("insert version", affected)
    }

    /// Inserts a shard row as given.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError::Db`] when the shard already exists.
    pub fn insert_shard(&self, shard: &Shard) -> Result<(), SqliteCatalogError> {
        let affected = self
            .lock()?
            .execute(
                "INSERT INTO shards (shardId, schemaName, shardDSN, version, taskName, \
                 lastTaskHb, lastUpdate) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    shard.shard_id.get(),
                    shard.schema_name,
                    shard.shard_dsn,
                    shard.version.get(),
                    shard.task_name.as_ref().map(TaskName::as_str),
                    shard.last_task_hb.map(Timestamp::as_unix_millis),
                    shard.last_update.map(Timestamp::as_unix_millis)
                ],
            )
            .map_err(db)?;
        expect_one("insert shard", affected)
    }

    /// Lists every shard by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError`] on query or decode failure.
    pub fn list_shards(&self) -> Result<Vec<Shard>, SqliteCatalogError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(&format!("SELECT {SHARD_COLUMNS} FROM shards ORDER BY shardId"))
            .map_err(db)?;
        let rows = statement.query_map(params![], read_shard).map_err(db)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    /// Lists every version in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError`] on query or decode failure.
    pub fn list_versions(&self) -> Result<Vec<Version>, SqliteCatalogError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(&format!("SELECT {VERSION_COLUMNS} FROM versions ORDER BY version"))
            .map_err(db)?;
        let rows = statement.query_map(params![], read_version).map_err(db)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    /// Lists operation log rows for a shard, optionally for one version,
    /// ordered by version then sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError`] on query or decode failure.
    pub fn list_oplog(
        &self,
        shard_id: ShardId,
        version: Option<VersionNumber>,
    ) -> Result<Vec<OpLogEntry>, SqliteCatalogError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(&format!(
                "SELECT {OPLOG_COLUMNS} FROM oplog WHERE shardId = ?1 AND (?2 IS NULL OR \
                 version = ?2) ORDER BY version, seq"
            ))
            .map_err(db)?;
        let rows = statement
            .query_map(params![shard_id.get(), version.map(VersionNumber::get)], read_oplog)
            .map_err(db)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    /// Clears any claim on a shard regardless of holder. Returns the previous
    /// holder, or `None` when the shard was not claimed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError::NotFound`] when the shard does not exist.
    pub fn force_release(&self, shard_id: ShardId) -> Result<Option<TaskName>, SqliteCatalogError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db)?;
        let holder: Option<Option<String>> = tx
            .query_row(
                "SELECT taskName FROM shards WHERE shardId = ?1",
                params![shard_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;
        let Some(holder) = holder else {
            return Err(SqliteCatalogError::NotFound(format!("shard {shard_id}")));
        };
        if holder.is_some() {
            let affected = tx
                .execute(
                    "UPDATE shards SET taskName = NULL, lastUpdate = ?1 WHERE shardId = ?2",
                    params![Timestamp::now().as_unix_millis(), shard_id.get()],
                )
                .map_err(db)?;
            expect_one("force release", affected)?;
        }
        tx.commit().map_err(db)?;
        Ok(holder.map(TaskName::new))
    }

    // ------------------------------------------------------------------------
    // Catalog operations
    // ------------------------------------------------------------------------

    /// Returns the highest version number, or zero.
    fn max_version_row(&self) -> Result<VersionNumber, SqliteCatalogError> {
        let max: Option<u32> = self
            .lock()?
            .query_row("SELECT MAX(version) FROM versions", params![], |row| row.get(0))
            .map_err(db)?;
        Ok(max.map_or(VersionNumber::ZERO, VersionNumber::new))
    }

    /// Point lookup on `versions`.
    fn version_row(&self, version: VersionNumber) -> Result<Version, SqliteCatalogError> {
        self.lock()?
            .query_row(
                &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE version = ?1"),
                params![version.get()],
                read_version,
            )
            .optional()
            .map_err(db)?
            .ok_or_else(|| SqliteCatalogError::NotFound(format!("version {version}")))
    }

    /// Smallest version above `after`.
    fn next_version_row(&self, after: VersionNumber) -> Result<Option<Version>, SqliteCatalogError> {
        self.lock()?
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM versions WHERE version > ?1 ORDER BY version \
                     ASC LIMIT 1"
                ),
                params![after.get()],
                read_version,
            )
            .optional()
            .map_err(db)
    }

    /// Point lookup on `shards`.
    fn shard_row(&self, shard_id: ShardId) -> Result<Shard, SqliteCatalogError> {
        self.lock()?
            .query_row(
                &format!("SELECT {SHARD_COLUMNS} FROM shards WHERE shardId = ?1"),
                params![shard_id.get()],
                read_shard,
            )
            .optional()
            .map_err(db)?
            .ok_or_else(|| SqliteCatalogError::NotFound(format!("shard {shard_id}")))
    }

    /// Selects and claims the oldest eligible shard in one transaction.
    fn claim(
        &self,
        below: VersionNumber,
        task_name: &TaskName,
    ) -> Result<Option<Shard>, SqliteCatalogError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db)?;
        let candidate: Option<u32> = tx
            .query_row(
                "SELECT shardId FROM shards WHERE version < ?1 AND taskName IS NULL ORDER BY \
                 lastUpdate ASC, shardId ASC LIMIT 1",
                params![below.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;
        let Some(shard_id) = candidate else {
            tx.commit().map_err(db)?;
            return Ok(None);
        };
        let affected = tx
            .execute(
                "UPDATE shards SET taskName = ?1, lastTaskHb = ?2, lastUpdate = ?2 WHERE shardId \
                 = ?3 AND taskName IS NULL",
                params![task_name.as_str(), Timestamp::now().as_unix_millis(), shard_id],
            )
            .map_err(db)?;
        expect_one("claim shard", affected)?;
        let shard = tx
            .query_row(
                &format!("SELECT {SHARD_COLUMNS} FROM shards WHERE shardId = ?1"),
                params![shard_id],
                read_shard,
            )
            .map_err(db)?;
        tx.commit().map_err(db)?;
        Ok(Some(shard))
    }

    /// Runs a conditional shard update that must touch exactly one row.
    fn update_claimed(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<(), SqliteCatalogError> {
        let affected = self.lock()?.execute(sql, params).map_err(db)?;
        expect_one(operation, affected)
    }

    /// Appends an oplog row in a single statement and returns its sequence.
    fn append_row(&self, record: &OpLogRecord) -> Result<u32, SqliteCatalogError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "INSERT INTO oplog (shardId, version, seq, taskName, message, output, err, \
                 lastUpdate) SELECT ?1, ?2, COALESCE(MAX(seq), 0) + 1, ?3, ?4, ?5, ?6, ?7 FROM \
                 oplog WHERE shardId = ?1 AND version = ?2 RETURNING seq",
            )
            .map_err(db)?;
        let rows = statement
            .query_map(
                params![
                    record.shard_id.get(),
                    record.version.get(),
                    record.task_name.as_str(),
                    record.message,
                    record.output,
                    record.err,
                    Timestamp::now().as_unix_millis()
                ],
                |row| row.get::<_, u32>(0),
            )
            .map_err(db)?;
        let seqs = rows.collect::<Result<Vec<_>, _>>().map_err(db)?;
        match seqs.as_slice() {
            [seq] => Ok(*seq),
            _ => Err(SqliteCatalogError::Conflict {
                operation: "append oplog",
                affected: seqs.len(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Catalog Contracts
// ============================================================================

impl VersionCatalog for SqliteCatalogStore {
    fn max_version(&self) -> Result<VersionNumber, CatalogError> {
        Ok(self.max_version_row()?)
    }

    fn version(&self, version: VersionNumber) -> Result<Version, CatalogError> {
        Ok(self.version_row(version)?)
    }

    fn next_version(&self, after: VersionNumber) -> Result<Option<Version>, CatalogError> {
        Ok(self.next_version_row(after)?)
    }
}

impl ShardRegistry for SqliteCatalogStore {
    fn shard(&self, shard_id: ShardId) -> Result<Shard, CatalogError> {
        Ok(self.shard_row(shard_id)?)
    }

    fn claim_shard_for_upgrade(
        &self,
        below: VersionNumber,
        task_name: &TaskName,
    ) -> Result<Option<Shard>, CatalogError> {
        Ok(self.claim(below, task_name)?)
    }

    fn update_heartbeat(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError> {
        let now = Timestamp::now().as_unix_millis();
        Ok(self.update_claimed(
            "update heartbeat",
            "UPDATE shards SET lastTaskHb = ?1, lastUpdate = ?1 WHERE shardId = ?2 AND taskName = \
             ?3",
            params![now, shard_id.get(), task_name.as_str()],
        )?)
    }

    fn mark_upgrade_complete(
        &self,
        shard_id: ShardId,
        task_name: &TaskName,
        new_version: VersionNumber,
    ) -> Result<(), CatalogError> {
        let now = Timestamp::now().as_unix_millis();
        Ok(self.update_claimed(
            "mark upgrade complete",
            "UPDATE shards SET version = ?1, taskName = NULL, lastTaskHb = ?2, lastUpdate = ?2 \
             WHERE shardId = ?3 AND taskName = ?4",
            params![new_version.get(), now, shard_id.get(), task_name.as_str()],
        )?)
    }

    fn release_claim(&self, shard_id: ShardId, task_name: &TaskName) -> Result<(), CatalogError> {
        let now = Timestamp::now().as_unix_millis();
        Ok(self.update_claimed(
            "release claim",
            "UPDATE shards SET taskName = NULL, lastTaskHb = ?1, lastUpdate = ?1 WHERE shardId = \
             ?2 AND taskName = ?3",
            params![now, shard_id.get(), task_name.as_str()],
        )?)
    }
}

impl OperationLog for SqliteCatalogStore {
    fn append(&self, record: &OpLogRecord) -> Result<u32, CatalogError> {
        Ok(self.append_row(record)?)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Decodes a `versions` row selected with [`VERSION_COLUMNS`].
fn read_version(row: &Row<'_>) -> rusqlite::Result<Version> {
    let cmd_type: String = row.get(3)?;
    Ok(Version {
        version: VersionNumber::new(row.get(0)?),
        command: row.get(1)?,
        table_name: row.get(2)?,
        cmd_type: CmdType::parse(&cmd_type),
        last_update: Timestamp::from_unix_millis(row.get(4)?),
    })
}

/// Decodes a `shards` row selected with [`SHARD_COLUMNS`].
fn read_shard(row: &Row<'_>) -> rusqlite::Result<Shard> {
    let task_name: Option<String> = row.get(4)?;
    let last_task_hb: Option<i64> = row.get(5)?;
    let last_update: Option<i64> = row.get(6)?;
    Ok(Shard {
        shard_id: ShardId::new(row.get(0)?),
        schema_name: row.get(1)?,
        shard_dsn: row.get(2)?,
        version: VersionNumber::new(row.get(3)?),
        task_name: task_name.map(TaskName::new),
        last_task_hb: last_task_hb.map(Timestamp::from_unix_millis),
        last_update: last_update.map(Timestamp::from_unix_millis),
    })
}

/// Decodes an `oplog` row selected with [`OPLOG_COLUMNS`].
fn read_oplog(row: &Row<'_>) -> rusqlite::Result<OpLogEntry> {
    let task_name: Option<String> = row.get(3)?;
    let last_update: Option<i64> = row.get(7)?;
    Ok(OpLogEntry {
        shard_id: ShardId::new(row.get(0)?),
        version: VersionNumber::new(row.get(1)?),
        seq: row.get(2)?,
        task_name: task_name.map(TaskName::new),
        message: row.get(4)?,
        output: row.get(5)?,
        err: row.get(6)?,
        last_update: last_update.map(Timestamp::from_unix_millis),
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteCatalogError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteCatalogError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteCatalogError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteCatalogError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteCatalogError::Invalid("store path is empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteCatalogError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteCatalogError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteCatalogError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteCatalogConfig) -> Result<Connection, SqliteCatalogError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteCatalogConfig,
) -> Result<(), SqliteCatalogError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db)?;
    Ok(())
}

/// Initializes the catalog schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteCatalogError> {
    let tx = connection.transaction().map_err(db)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS versions (
                    version INTEGER PRIMARY KEY,
                    command TEXT NOT NULL,
                    tableName TEXT NOT NULL,
                    cmdType TEXT NOT NULL,
                    lastUpdate INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS shards (
                    shardId INTEGER PRIMARY KEY,
                    schemaName TEXT NOT NULL,
                    shardDSN TEXT NOT NULL,
                    version INTEGER NOT NULL DEFAULT 0,
                    taskName TEXT,
                    lastTaskHb INTEGER,
                    lastUpdate INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_shards_claim
                    ON shards (taskName, version, lastUpdate);
                CREATE TABLE IF NOT EXISTS oplog (
                    shardId INTEGER NOT NULL,
                    version INTEGER NOT NULL,
                    seq INTEGER NOT NULL,
                    taskName TEXT,
                    message TEXT,
                    output TEXT,
                    err TEXT,
                    lastUpdate INTEGER,
                    PRIMARY KEY (shardId, version, seq)
                );",
            )
            .map_err(db)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteCatalogError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db)?;
    Ok(())
}
