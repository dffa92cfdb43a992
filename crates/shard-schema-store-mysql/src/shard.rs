// crates/shard-schema-store-mysql/src/shard.rs
// ============================================================================
// Module: MySQL Shard Connector
// Description: Task-scoped connections to MySQL shard databases.
// Purpose: Execute `sql` versions against a shard's own schema.
// Dependencies: shard-schema-core, mysql_async, tokio, tracing
// ============================================================================

//! ## Overview
//! Connection options come from the shard's parsed DSN; the database is the
//! shard's `schemaName`, not the DSN database segment. `tcp` addresses are
//! `host[:port]` or `[v6-host][:port]`, and `unix` addresses are socket
//! paths. The optional `timeout` DSN parameter (`500ms`, `5s`, `1m`) bounds
//! connection setup.
//!
//! Each task opens one connection and disconnects it when the task ends.
//! Error messages name the shard and schema, never the password.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use mysql_async::Conn;
use mysql_async::Opts;
use mysql_async::OptsBuilder;
use mysql_async::prelude::Queryable;
use shard_schema_core::Shard;
use shard_schema_core::ShardConnection;
use shard_schema_core::ShardConnectionError;
use shard_schema_core::ShardConnector;
use shard_schema_core::ShardDsn;
use tokio::runtime::Runtime;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connection setup limit when the DSN carries no `timeout` parameter.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Port used when a `tcp` address omits one.
const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Address used when a `tcp` DSN has none.
const DEFAULT_TCP_ADDR: &str = "127.0.0.1:3306";

/// Socket used when a `unix` DSN has none.
const DEFAULT_UNIX_SOCKET: &str = "/tmp/mysql.sock";

/// Runtime worker threads driving shard connections.
const RUNTIME_WORKER_THREADS: usize = 2;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Builds driver options for `shard` from its DSN and schema name.
///
/// # Errors
///
/// Returns [`ShardConnectionError::Connect`] when the DSN is invalid, names an
/// unsupported network, or the shard has no schema name.
pub fn shard_opts(shard: &Shard) -> Result<Opts, ShardConnectionError> {
    let dsn = ShardDsn::parse(&shard.shard_dsn)
        .map_err(|err| ShardConnectionError::Connect(format!("shard {}: {err}", shard.shard_id)))?;
    if shard.schema_name.trim().is_empty() {
        return Err(ShardConnectionError::Connect(format!(
            "shard {} has an empty schema name",
            shard.shard_id
        )));
    }
    let mut builder = OptsBuilder::default()
        .user((!dsn.user.is_empty()).then(|| dsn.user.clone()))
        .pass((!dsn.password.is_empty()).then(|| dsn.password.clone()))
        .db_name(Some(shard.schema_name.clone()));
    let addr = dsn.addr.as_deref().filter(|addr| !addr.is_empty());
    match dsn.net.as_deref() {
        None | Some("tcp" | "tcp4" | "tcp6") => {
            let (host, port) = split_host_port(addr.unwrap_or(DEFAULT_TCP_ADDR))
                .map_err(|reason| {
                    ShardConnectionError::Connect(format!("shard {}: {reason}", shard.shard_id))
                })?;
            builder = builder.ip_or_hostname(host).tcp_port(port).prefer_socket(false);
        }
        Some("unix") => {
            builder = builder.socket(Some(addr.unwrap_or(DEFAULT_UNIX_SOCKET)));
        }
        Some(other) => {
            return Err(ShardConnectionError::Connect(format!(
                "shard {}: unsupported network '{other}'",
                shard.shard_id
            )));
        }
    }
    Ok(Opts::from(builder))
}

/// Returns the connection setup limit for `shard`.
fn connect_timeout(shard: &Shard) -> Duration {
    ShardDsn::parse(&shard.shard_dsn)
        .ok()
        .and_then(|dsn| dsn.param("timeout").and_then(parse_duration))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
}

/// Splits `host[:port]` or `[host][:port]`.
fn split_host_port(addr: &str) -> Result<(String, u16), String> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let Some((host, tail)) = rest.split_once(']') else {
            return Err(format!("unterminated IPv6 address '{addr}'"));
        };
        match tail {
            "" => (host, None),
            _ => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(format!("invalid address '{addr}'")),
            },
        }
    } else {
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => (host, Some(port)),
            // Plain host, or a bare IPv6 literal without a port.
            _ => (addr, None),
        }
    };
    if host.is_empty() {
        return Err(format!("missing host in address '{addr}'"));
    }
    let port = match port {
        Some(port) => port.parse::<u16>().map_err(|_| format!("invalid port in address '{addr}'"))?,
        None => DEFAULT_MYSQL_PORT,
    };
    Ok((host.to_string(), port))
}

/// Parses `<n>ms`, `<n>s`, or `<n>m`; zero and other forms are rejected.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let duration = if let Some(millis) = value.strip_suffix("ms") {
        Duration::from_millis(millis.parse().ok()?)
    } else if let Some(secs) = value.strip_suffix('s') {
        Duration::from_secs(secs.parse().ok()?)
    } else if let Some(mins) = value.strip_suffix('m') {
        Duration::from_secs(mins.parse::<u64>().ok()?.checked_mul(60)?)
    } else {
        return None;
    };
    (!duration.is_zero()).then_some(duration)
}

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Opens MySQL connections for shard tasks.
#[derive(Clone)]
pub struct MySqlShardConnector {
    /// Runtime driving the async driver; shared with open connections.
    runtime: Arc<Runtime>,
}

impl MySqlShardConnector {
    /// Creates a connector with its own runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ShardConnectionError::Connect`] when the runtime cannot be
    /// built.
    pub fn new() -> Result<Self, ShardConnectionError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKER_THREADS)
            .thread_name("shard-schema-mysql")
            .enable_all()
            .build()
            .map_err(|err| ShardConnectionError::Connect(format!("mysql runtime: {err}")))?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl ShardConnector for MySqlShardConnector {
    fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardConnection>, ShardConnectionError> {
        let opts = shard_opts(shard)?;
        let target = format!("shard {} schema {}", shard.shard_id, shard.schema_name);
        let limit = connect_timeout(shard);
        let conn = self
            .runtime
            .block_on(async { tokio::time::timeout(limit, Conn::new(opts)).await })
            .map_err(|_| {
                ShardConnectionError::Connect(format!(
                    "{target}: timed out after {} ms",
                    limit.as_millis()
                ))
            })?
            .map_err(|err| ShardConnectionError::Connect(format!("{target}: {err}")))?;
        debug!(shard_id = %shard.shard_id, target = target.as_str(), "shard connection opened");
        Ok(Box::new(MySqlShardConnection {
            runtime: Arc::clone(&self.runtime),
            conn: Some(conn),
        }))
    }
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Connection owned by one task; disconnected on drop.
struct MySqlShardConnection {
    /// Runtime the connection was opened on.
    runtime: Arc<Runtime>,
    /// Open connection; `None` once disconnected.
    conn: Option<Conn>,
}

impl ShardConnection for MySqlShardConnection {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ShardConnectionError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(ShardConnectionError::Execute("connection closed".to_string()));
        };
        self.runtime
            .block_on(conn.query_drop(statement))
            .map_err(|err| ShardConnectionError::Execute(err.to_string()))
    }
}

impl Drop for MySqlShardConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(err) = self.runtime.block_on(conn.disconnect())
        {
            debug!(error = %err, "shard connection disconnect failed");
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
