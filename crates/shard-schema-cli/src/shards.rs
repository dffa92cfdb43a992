// crates/shard-schema-cli/src/shards.rs
// ============================================================================
// Module: Shard Backends
// Description: Routes shard connections to MySQL or SQLite by DSN network.
// Purpose: Let one catalog mix MySQL shards and local SQLite shard files.
// Dependencies: shard-schema-core, shard-schema-store-mysql, shard-schema-store-sqlite
// ============================================================================

//! ## Overview
//! Shards whose DSN network is `file` are SQLite databases under the DSN
//! address; every other shard is a MySQL server. Invalid DSNs fail as
//! connection errors so the task is recorded as failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use shard_schema_core::Shard;
use shard_schema_core::ShardConnection;
use shard_schema_core::ShardConnectionError;
use shard_schema_core::ShardConnector;
use shard_schema_core::ShardDsn;
use shard_schema_store_mysql::MySqlShardConnector;
use shard_schema_store_sqlite::SqliteShardConnector;

// ============================================================================
// SECTION: Routing
// ============================================================================

/// DSN network naming a directory of SQLite shard files.
const SQLITE_NET: &str = "file";

/// Backend serving one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShardBackend {
    /// MySQL server reached over `tcp` or `unix`.
    MySql,
    /// SQLite file under the DSN address.
    Sqlite,
}

/// Picks the backend for a parsed DSN.
pub(crate) fn backend_for(dsn: &ShardDsn) -> ShardBackend {
    if dsn.net.as_deref() == Some(SQLITE_NET) { ShardBackend::Sqlite } else { ShardBackend::MySql }
}

/// Connector dispatching to the backend named by each shard's DSN.
pub(crate) struct ShardBackends {
    /// MySQL shards.
    mysql: MySqlShardConnector,
    /// SQLite shards.
    sqlite: SqliteShardConnector,
}

impl ShardBackends {
    /// Creates both backends.
    pub(crate) fn new() -> Result<Self, ShardConnectionError> {
        Ok(Self {
            mysql: MySqlShardConnector::new()?,
            sqlite: SqliteShardConnector::new(),
        })
    }
}

impl ShardConnector for ShardBackends {
    fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardConnection>, ShardConnectionError> {
        let dsn = ShardDsn::parse(&shard.shard_dsn).map_err(|err| {
            ShardConnectionError::Connect(format!("shard {}: {err}", shard.shard_id))
        })?;
        match backend_for(&dsn) {
            ShardBackend::MySql => self.mysql.connect(shard),
            ShardBackend::Sqlite => self.sqlite.connect(shard),
        }
    }
}
