// crates/shard-schema-store-sqlite/src/shard.rs
// ============================================================================
// Module: SQLite Shard Connector
// Description: Task-scoped connections to per-shard SQLite databases.
// Purpose: Execute `sql` versions against a shard's own database.
// Dependencies: shard-schema-core, rusqlite
// ============================================================================

//! ## Overview
//! A shard DSN names a directory in its address, for example
//! `file(/var/lib/shards)/`. The shard database is `<addr>/<schemaName>.db`.
//! Connections open an existing file only; a missing database is a
//! connection error rather than a silently created empty shard.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use shard_schema_core::Shard;
use shard_schema_core::ShardConnection;
use shard_schema_core::ShardConnectionError;
use shard_schema_core::ShardConnector;
use shard_schema_core::ShardDsn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout for shard connections (ms).
const DEFAULT_SHARD_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Shard database file extension.
const SHARD_FILE_EXTENSION: &str = "db";

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Opens shard databases named by the shard DSN and schema.
#[derive(Debug, Clone)]
pub struct SqliteShardConnector {
    /// Busy timeout applied to each connection.
    busy_timeout: Duration,
}

impl Default for SqliteShardConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteShardConnector {
    /// Creates a connector with the default busy timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy_timeout: Duration::from_millis(DEFAULT_SHARD_BUSY_TIMEOUT_MS),
        }
    }

    /// Resolves the database file for a shard.
    ///
    /// # Errors
    ///
    /// Returns [`ShardConnectionError::Connect`] when the DSN is invalid or
    /// carries no address.
    pub fn database_path(shard: &Shard) -> Result<PathBuf, ShardConnectionError> {
        let dsn = ShardDsn::parse(&shard.shard_dsn)
            .map_err(|err| ShardConnectionError::Connect(err.to_string()))?;
        let Some(addr) = dsn.addr.filter(|addr| !addr.is_empty()) else {
            return Err(ShardConnectionError::Connect(format!(
                "shard {} DSN has no address",
                shard.shard_id
            )));
        };
        if shard.schema_name.is_empty() || shard.schema_name.contains(['/', '\\']) {
            return Err(ShardConnectionError::Connect(format!(
                "shard {} has an invalid schema name",
                shard.shard_id
            )));
        }
        Ok(PathBuf::from(addr).join(format!("{}.{SHARD_FILE_EXTENSION}", shard.schema_name)))
    }
}

impl ShardConnector for SqliteShardConnector {
    fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardConnection>, ShardConnectionError> {
        let path = Self::database_path(shard)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(&path, flags).map_err(|err| {
            ShardConnectionError::Connect(format!("{}: {err}", path.display()))
        })?;
        connection
            .busy_timeout(self.busy_timeout)
            .map_err(|err| ShardConnectionError::Connect(err.to_string()))?;
        Ok(Box::new(SqliteShardConnection {
            connection,
        }))
    }
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Connection owned by one task; closed on drop.
struct SqliteShardConnection {
    /// Open shard database.
    connection: Connection,
}

impl ShardConnection for SqliteShardConnection {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ShardConnectionError> {
        self.connection
            .execute_batch(statement)
            .map_err(|err| ShardConnectionError::Execute(err.to_string()))
    }
}
