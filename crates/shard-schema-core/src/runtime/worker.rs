// crates/shard-schema-core/src/runtime/worker.rs
// ============================================================================
// Module: Migration Workers
// Description: Worker pool threads that apply one version to one shard.
// Purpose: Execute `sql` and `pt-osc` tasks and report exactly one outcome.
// Dependencies: crate::core, crate::interfaces, crossbeam-channel, tracing
// ============================================================================

//! ## Overview
//! Each worker loops on the shared task channel, runs one task to completion,
//! and sends one [`FromWorker`] reply before taking the next task. Task
//! failures are data: they become a `Failed` reply with diagnostics in the
//! operation log, and the worker keeps serving. A worker exits when the task
//! channel disconnects or the reply channel is gone.
//!
//! Security posture: shard passwords are passed to the child process only;
//! every logged or persisted rendering of the pt-osc arguments masks them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::CmdType;
use crate::core::FromWorker;
use crate::core::OpLogRecord;
use crate::core::ShardDsn;
use crate::core::Task;
use crate::core::TaskOutcome;
use crate::core::ToWorker;
use crate::interfaces::OperationLog;
use crate::interfaces::ShardConnector;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default program name of the online schema change tool.
pub const DEFAULT_PT_OSC_PATH: &str = "pt-online-schema-change";

/// Thread name prefix for pool workers.
const WORKER_THREAD_PREFIX: &str = "shard-schema-worker";

/// Completion message shared by both execution paths.
const COMPLETED_OK: &str = "Completed OK";

// ============================================================================
// SECTION: Context
// ============================================================================

/// Shared dependencies of every worker in the pool.
#[derive(Clone)]
pub struct WorkerContext {
    /// Operation log sink.
    pub oplog: Arc<dyn OperationLog>,
    /// Opens task-scoped shard connections for `sql` versions.
    pub connector: Arc<dyn ShardConnector>,
    /// Program invoked for `pt-osc` versions.
    pub pt_osc_path: PathBuf,
}

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Spawns `count` named worker threads sharing one task channel.
///
/// # Errors
///
/// Returns an I/O error when a thread cannot be spawned; threads already
/// started exit once `tasks` disconnects.
pub fn spawn_workers(
    count: usize,
    context: &WorkerContext,
    tasks: &Receiver<ToWorker>,
    replies: &Sender<FromWorker>,
) -> io::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(count);
    for index in 0 .. count {
        let context = context.clone();
        let tasks = tasks.clone();
        let replies = replies.clone();
        let handle = thread::Builder::new()
            .name(format!("{WORKER_THREAD_PREFIX}-{index}"))
            .spawn(move || worker_loop(index, &context, &tasks, &replies))?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Serves tasks until either channel disconnects.
fn worker_loop(
    index: usize,
    context: &WorkerContext,
    tasks: &Receiver<ToWorker>,
    replies: &Sender<FromWorker>,
) {
    debug!(worker = index, "worker started");
    while let Ok(ToWorker::NewTask(task)) = tasks.recv() {
        let outcome = execute_task(context, &task);
        debug!(
            worker = index,
            task = %task,
            outcome = outcome.as_str(),
            code = outcome.code(),
            "task finished"
        );
        if replies.send(FromWorker { task, outcome }).is_err() {
            warn!(worker = index, "reply channel closed; worker exiting");
            return;
        }
    }
    debug!(worker = index, "task channel closed; worker exiting");
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Runs one task to completion and returns its terminal outcome.
#[must_use]
pub fn execute_task(context: &WorkerContext, task: &Task) -> TaskOutcome {
    match &task.version.cmd_type {
        CmdType::Sql => execute_sql(context, task),
        CmdType::PtOsc => execute_pt_osc(context, task),
        CmdType::Unsupported(label) => {
            warn!(task = %task, cmd_type = label.as_str(), "unsupported command type");
            record(context, task, &format!("Error: unsupported command type '{label}'"), "", "");
            TaskOutcome::Failed
        }
    }
}

/// Builds the literal `ALTER TABLE` statement for a version.
#[must_use]
pub fn alter_statement(table_name: &str, command: &str) -> String {
    format!("alter table `{table_name}` {command}")
}

/// Applies a `sql` version over a task-scoped shard connection.
fn execute_sql(context: &WorkerContext, task: &Task) -> TaskOutcome {
    let ddl = alter_statement(&task.version.table_name, &task.version.command);
    record(context, task, &format!("starting SQL command: '{ddl}'"), "", "");
    info!(task = %task, "starting sql migration");

    let mut connection = match context.connector.connect(&task.shard) {
        Ok(connection) => connection,
        Err(err) => {
            error!(task = %task, error = %err, "shard connection failed");
            record(context, task, "Error: shard db connection", "", &err.to_string());
            return TaskOutcome::Failed;
        }
    };
    if let Err(err) = connection.execute_ddl(&ddl) {
        error!(task = %task, error = %err, "ddl failed");
        record(context, task, "Error: ddl error", "", &err.to_string());
        return TaskOutcome::Failed;
    }
    drop(connection);

    record(context, task, COMPLETED_OK, "", "");
    info!(task = %task, "sql migration completed");
    TaskOutcome::Done
}

/// Applies a `pt-osc` version by running the external tool.
fn execute_pt_osc(context: &WorkerContext, task: &Task) -> TaskOutcome {
    let dsn = match ShardDsn::parse(&task.shard.shard_dsn) {
        Ok(dsn) => dsn,
        Err(err) => {
            let masked = mask_unparsed_dsn(&task.shard.shard_dsn);
            error!(task = %task, dsn = masked.as_str(), error = %err, "shard dsn parse failed");
            record(
                context,
                task,
                &format!("Error parsing the shard DSN: '{masked}'"),
                "",
                &err.to_string(),
            );
            return TaskOutcome::Failed;
        }
    };

    let args = PtOscArgs::new(task, &dsn);
    let program = context.pt_osc_path.display().to_string();
    let shown = args.masked.join(" ");
    record(context, task, &format!("starting pt-osc command: {program} with args: {shown}"), "", "");
    info!(task = %task, program = program.as_str(), args = shown.as_str(), "starting pt-osc");

    let child = Command::new(&context.pt_osc_path)
        .args(&args.real)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(err) => {
            error!(task = %task, program = program.as_str(), error = %err, "pt-osc failed to start");
            record(
                context,
                task,
                &format!("Error: command: {program} with args: [{shown}] failed to start"),
                "",
                &err.to_string(),
            );
            return TaskOutcome::Failed;
        }
    };

    let failed_message = format!("Error: command: {program} with args: [{shown}] failed");
    match child.wait_with_output() {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if output.status.success() {
                record(context, task, COMPLETED_OK, &stdout, &stderr);
                info!(task = %task, "pt-osc completed");
                TaskOutcome::Done
            } else {
                error!(task = %task, status = %output.status, "pt-osc failed");
                record(context, task, &failed_message, &stdout, &stderr);
                TaskOutcome::Failed
            }
        }
        Err(err) => {
            error!(task = %task, error = %err, "pt-osc wait failed");
            record(context, task, &failed_message, "", &err.to_string());
            TaskOutcome::Failed
        }
    }
}

// ============================================================================
// SECTION: pt-osc Arguments
// ============================================================================

/// Child arguments and their loggable rendering.
struct PtOscArgs {
    /// Arguments passed to the child process.
    real: Vec<String>,
    /// Same arguments with the password replaced.
    masked: Vec<String>,
}

impl PtOscArgs {
    /// Builds `--execute --alter <command> u=..,p=..,D=..,t=..`.
    fn new(task: &Task, dsn: &ShardDsn) -> Self {
        let target = |password: &str| {
            format!(
                "u={},p={},D={},t={}",
                dsn.user, password, task.shard.schema_name, task.version.table_name
            )
        };
        let prefix = ["--execute".to_string(), "--alter".to_string(), task.version.command.clone()];
        let mut real = prefix.to_vec();
        real.push(target(&dsn.password));
        let mut masked = prefix.to_vec();
        masked.push(target("***"));
        Self {
            real,
            masked,
        }
    }
}

/// Masks the credential part of a DSN that failed to parse.
fn mask_unparsed_dsn(raw: &str) -> String {
    let Some(at) = raw.rfind('@') else {
        return raw.to_string();
    };
    let (credentials, rest) = raw.split_at(at);
    match credentials.split_once(':') {
        Some((user, _)) => format!("{user}:***{rest}"),
        None => raw.to_string(),
    }
}

// ============================================================================
// SECTION: Operation Log
// ============================================================================

/// Appends an operation log row; failures are logged and never change the
/// task outcome.
fn record(context: &WorkerContext, task: &Task, message: &str, output: &str, err: &str) {
    let entry = OpLogRecord {
        shard_id: task.shard.shard_id,
        version: task.version.version,
        task_name: task.name.clone(),
        message: message.to_string(),
        output: output.to_string(),
        err: err.to_string(),
    };
    if let Err(append_err) = context.oplog.append(&entry) {
        error!(task = %task, entry = message, error = %append_err, "oplog append failed");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
