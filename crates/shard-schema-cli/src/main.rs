// crates/shard-schema-cli/src/main.rs
// ============================================================================
// Module: Shard Schema CLI Entry Point
// Description: Command dispatcher for rollout and operator workflows.
// Purpose: Bootstrap the dispatcher and expose catalog inspection commands.
// Dependencies: clap, shard-schema-config, shard-schema-core, shard-schema-store-mysql,
//               shard-schema-store-sqlite, serde, thiserror.
// ============================================================================

//! ## Overview
//! `shard-schema run` loads configuration, opens the catalog, derives the
//! `<host>:<pid>` task name, and drives the dispatcher loop. The remaining
//! subcommands read or repair catalog state: `status` and `oplog` print JSON,
//! `shards release` clears a claim held after a failed task, and
//! `config validate` checks a configuration file without side effects.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod identity;
#[cfg(test)]
mod main_tests;
mod shards;
mod telemetry;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use shard_schema_config::ShardSchemaConfig;
use shard_schema_core::Dispatcher;
use shard_schema_core::DispatcherDeps;
use shard_schema_core::FileThrottleSignal;
use shard_schema_core::Shard;
use shard_schema_core::ShardId;
use shard_schema_core::TaskName;
use shard_schema_core::Timestamp;
use shard_schema_core::VersionCatalog;
use shard_schema_core::VersionNumber;
use shard_schema_store_sqlite::SqliteCatalogStore;
use shards::ShardBackends;
use telemetry::LogFormat;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "shard-schema", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Diagnostic log format on stderr.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the rolling schema dispatcher.
    Run(RunCommand),
    /// Print shard versions and claims as JSON.
    Status(ConfigArgs),
    /// Print operation log entries for a shard as JSON.
    Oplog(OplogCommand),
    /// Shard claim maintenance.
    Shards {
        /// Selected shard subcommand.
        #[command(subcommand)]
        command: ShardsCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config file location shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Optional config file path (defaults to shard-schema.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Config location.
    #[command(flatten)]
    location: ConfigArgs,
    /// Stop after this many ticks instead of running until killed.
    #[arg(long = "max-ticks", value_name = "N")]
    max_ticks: Option<usize>,
}

/// Arguments for `oplog`.
#[derive(Args, Debug)]
struct OplogCommand {
    /// Config location.
    #[command(flatten)]
    location: ConfigArgs,
    /// Shard identifier.
    #[arg(long, value_name = "ID")]
    shard: u32,
    /// Restrict output to one target version.
    #[arg(long, value_name = "VERSION")]
    version: Option<u32>,
}

/// Shard subcommands.
#[derive(Subcommand, Debug)]
enum ShardsCommand {
    /// Clear the claim on a shard so the dispatcher retries it.
    Release(ShardReleaseCommand),
}

/// Arguments for `shards release`.
#[derive(Args, Debug)]
struct ShardReleaseCommand {
    /// Config location.
    #[command(flatten)]
    location: ConfigArgs,
    /// Shard identifier.
    #[arg(long, value_name = "ID")]
    shard: u32,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a shard-schema configuration file.
    Validate(ConfigArgs),
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// JSON body of `status`.
#[derive(Debug, Serialize)]
struct StatusReport {
    /// Highest version in the catalog.
    max_version: VersionNumber,
    /// Shards that have not reached `max_version`.
    pending: usize,
    /// Every shard, by identifier.
    shards: Vec<ShardStatus>,
}

/// One shard row in `status`. The DSN is omitted.
#[derive(Debug, Serialize)]
struct ShardStatus {
    /// Shard identifier.
    shard_id: ShardId,
    /// Schema name.
    schema_name: String,
    /// Applied version.
    version: VersionNumber,
    /// Current claim holder.
    task_name: Option<TaskName>,
    /// Last heartbeat.
    last_task_hb: Option<Timestamp>,
}

impl From<Shard> for ShardStatus {
    fn from(shard: Shard) -> Self {
        Self {
            shard_id: shard.shard_id,
            schema_name: shard.schema_name,
            version: shard.version,
            task_name: shard.task_name,
            last_task_hb: shard.last_task_hb,
        }
    }
}

/// JSON body of `shards release`.
#[derive(Debug, Serialize)]
struct ReleaseReport {
    /// Shard identifier.
    shard_id: ShardId,
    /// Task name that held the claim, if any.
    released_from: Option<TaskName>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_format);
    match cli.command {
        Commands::Run(command) => command_run(&command),
        Commands::Status(location) => command_status(&location),
        Commands::Oplog(command) => command_oplog(&command),
        Commands::Shards {
            command,
        } => match command {
            ShardsCommand::Release(command) => command_shards_release(&command),
        },
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(location) => command_config_validate(&location),
        },
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_config(command.location.config.as_deref())?;
    let store = open_store(&config)?;
    let settings = config.dispatcher_settings(identity::process_task_name());
    let throttle = FileThrottleSignal::new(config.dispatcher.throttling_file.clone());
    info!(
        task_name = %settings.task_name,
        workers = settings.num_workers,
        catalog = %store.path().display(),
        throttling_file = %throttle.path().display(),
        on_failure = settings.failure_policy.as_str(),
        max_attempts = settings.max_attempts,
        "starting shard schema dispatcher"
    );
    let connector = ShardBackends::new()
        .map_err(|err| CliError::new(format!("shard connector setup failed: {err}")))?;
    let deps = DispatcherDeps {
        catalog: Arc::new(store),
        connector: Arc::new(connector),
        throttle: Box::new(throttle),
    };
    let mut dispatcher = Dispatcher::new(deps, settings)
        .map_err(|err| CliError::new(format!("dispatcher start failed: {err}")))?;
    match command.max_ticks {
        Some(ticks) => {
            let reports = dispatcher.run_for(ticks);
            let claimed = reports.iter().filter(|report| report.claimed.is_some()).count();
            info!(ticks, claimed, "dispatcher reached its tick limit");
        }
        None => {
            let stop = AtomicBool::new(false);
            dispatcher.run(&stop);
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Inspection Commands
// ============================================================================

/// Executes the `status` command.
fn command_status(location: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(location.config.as_deref())?;
    let store = open_store(&config)?;
    let max_version = store
        .max_version()
        .map_err(|err| CliError::new(format!("catalog read failed: {err}")))?;
    let shards = store
        .list_shards()
        .map_err(|err| CliError::new(format!("catalog read failed: {err}")))?;
    write_json(&status_report(max_version, shards))?;
    Ok(ExitCode::SUCCESS)
}

/// Builds the `status` body.
fn status_report(max_version: VersionNumber, shards: Vec<Shard>) -> StatusReport {
    let pending = shards.iter().filter(|shard| shard.version < max_version).count();
    StatusReport {
        max_version,
        pending,
        shards: shards.into_iter().map(ShardStatus::from).collect(),
    }
}

/// Executes the `oplog` command.
fn command_oplog(command: &OplogCommand) -> CliResult<ExitCode> {
    let config = load_config(command.location.config.as_deref())?;
    let store = open_store(&config)?;
    let entries = store
        .list_oplog(ShardId::new(command.shard), command.version.map(VersionNumber::new))
        .map_err(|err| CliError::new(format!("catalog read failed: {err}")))?;
    write_json(&entries)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Maintenance Commands
// ============================================================================

/// Executes the `shards release` command.
fn command_shards_release(command: &ShardReleaseCommand) -> CliResult<ExitCode> {
    let config = load_config(command.location.config.as_deref())?;
    let store = open_store(&config)?;
    let shard_id = ShardId::new(command.shard);
    let released_from = store
        .force_release(shard_id)
        .map_err(|err| CliError::new(format!("release failed: {err}")))?;
    match &released_from {
        Some(task_name) => info!(%shard_id, %task_name, "operator released shard claim"),
        None => info!(%shard_id, "shard was not claimed"),
    }
    write_json(&ReleaseReport {
        shard_id,
        released_from,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `config validate` command.
fn command_config_validate(location: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(location.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Bootstrap Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<ShardSchemaConfig> {
    ShardSchemaConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Opens the catalog named by the configuration.
fn open_store(config: &ShardSchemaConfig) -> CliResult<SqliteCatalogStore> {
    SqliteCatalogStore::open(config.to_store_config())
        .map_err(|err| CliError::new(format!("catalog open failed: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("json encoding failed: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error(&err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a stdout write failure.
fn output_error(error: &std::io::Error) -> String {
    format!("failed to write to stdout: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
