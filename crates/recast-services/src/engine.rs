//! External analysis engine: line protocol, consumer and execution lifecycle
//!
//! The engine writes one JSON object per line to stdout, tagged by an integer
//! `k`. Rewrite and create messages become jobs; progress messages feed a
//! [`ProgressSink`]; everything else is informational. Lines that fail to
//! decode are logged and skipped.

use crate::error::{EngineError, EngineResult};
use crate::jobs::{Case, CaseKind, Job};
use crate::registry::{JobRegistry, Registration};
use chrono::{DateTime, Utc};
use recast_config::EngineConfig;
use recast_foundation::{RecastError, RecastResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::Instrument;

/// Message written to the engine's stdin to ask it to stop
const SHUTDOWN_COMMAND: &str = "shutdown\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    Change {
        path: PathBuf,
        range: (u64, u64),
        text: String,
        codemod_name: String,
    },
    Finish,
    Rewrite {
        input_path: PathBuf,
        output_path: PathBuf,
        codemod_name: String,
    },
    Create {
        path: PathBuf,
        output_path: PathBuf,
        codemod_name: String,
    },
    Compare {
        id: String,
        equal: bool,
    },
    Progress {
        processed: u64,
        total: u64,
    },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message has no integer 'k' field")]
    MissingKind,

    #[error("unknown message kind {0}")]
    UnknownKind(u64),

    #[error("message of kind {kind} does not match its schema: {source}")]
    Schema {
        kind: u64,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct ChangePayload {
    p: PathBuf,
    r: (u64, u64),
    t: String,
    c: String,
}

#[derive(Deserialize)]
struct RewritePayload {
    i: PathBuf,
    o: PathBuf,
    c: String,
}

#[derive(Deserialize)]
struct CreatePayload {
    p: PathBuf,
    o: PathBuf,
    c: String,
}

#[derive(Deserialize)]
struct ComparePayload {
    i: String,
    e: bool,
}

#[derive(Deserialize)]
struct ProgressPayload {
    p: u64,
    t: u64,
}

impl EngineMessage {
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(line).map_err(DecodeError::InvalidJson)?;
        let kind = value
            .get("k")
            .and_then(Value::as_u64)
            .ok_or(DecodeError::MissingKind)?;

        fn payload<T: for<'de> Deserialize<'de>>(kind: u64, value: Value) -> Result<T, DecodeError> {
            serde_json::from_value(value).map_err(|source| DecodeError::Schema { kind, source })
        }

        let message = match kind {
            1 => {
                let ChangePayload { p, r, t, c } = payload(kind, value)?;
                EngineMessage::Change {
                    path: p,
                    range: r,
                    text: t,
                    codemod_name: c,
                }
            }
            2 => EngineMessage::Finish,
            3 => {
                let RewritePayload { i, o, c } = payload(kind, value)?;
                EngineMessage::Rewrite {
                    input_path: i,
                    output_path: o,
                    codemod_name: c,
                }
            }
            4 => {
                let CreatePayload { p, o, c } = payload(kind, value)?;
                EngineMessage::Create {
                    path: p,
                    output_path: o,
                    codemod_name: c,
                }
            }
            5 => {
                let ComparePayload { i, e } = payload(kind, value)?;
                EngineMessage::Compare { id: i, equal: e }
            }
            6 => {
                let ProgressPayload { p, t } = payload(kind, value)?;
                EngineMessage::Progress {
                    processed: p,
                    total: t,
                }
            }
            other => return Err(DecodeError::UnknownKind(other)),
        };

        Ok(message)
    }
}

/// Receives engine progress, e.g. a status bar or a log line
pub trait ProgressSink: Send {
    fn progress(&mut self, processed: u64, total: u64);

    fn finished(&mut self) {}
}

/// Reports progress through `tracing`
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&mut self, processed: u64, total: u64) {
        tracing::info!(processed, total, "Engine progress");
    }

    fn finished(&mut self) {
        tracing::info!("Engine finished");
    }
}

/// What a single stdout line amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Progress { processed: u64, total: u64 },
    Job(Registration),
    /// Decoded, but informational only
    Ignored,
    /// The execution was halted; the line was not translated
    Halted,
    DecodeFailed(String),
}

/// Translates engine output lines into jobs
pub struct EngineLineConsumer {
    codemod_set_name: String,
    halted: Arc<AtomicBool>,
    progress: Box<dyn ProgressSink>,
    total_file_count: u64,
    jobs_created: usize,
    decode_failures: usize,
}

impl EngineLineConsumer {
    pub fn new(codemod_set_name: impl Into<String>, progress: Box<dyn ProgressSink>) -> Self {
        Self {
            codemod_set_name: codemod_set_name.into(),
            halted: Arc::new(AtomicBool::new(false)),
            progress,
            total_file_count: 0,
            jobs_created: 0,
            decode_failures: 0,
        }
    }

    pub fn halt_flag(&self) -> Arc<AtomicBool> {
        self.halted.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn consume(&mut self, line: &str, registry: &mut JobRegistry) -> LineOutcome {
        if self.is_halted() {
            return LineOutcome::Halted;
        }
        if line.trim().is_empty() {
            return LineOutcome::Ignored;
        }

        let message = match EngineMessage::decode(line) {
            Ok(message) => message,
            Err(err) => {
                self.decode_failures += 1;
                tracing::warn!(error = %err, line, "Failed to decode engine message");
                return LineOutcome::DecodeFailed(err.to_string());
            }
        };

        let (codemod_name, job) = match message {
            EngineMessage::Progress { processed, total } => {
                self.total_file_count = total;
                self.progress.progress(processed, total);
                return LineOutcome::Progress { processed, total };
            }
            informational @ (EngineMessage::Finish
            | EngineMessage::Compare { .. }
            | EngineMessage::Change { .. }) => {
                tracing::debug!(message = ?informational, "Informational engine message");
                return LineOutcome::Ignored;
            }
            EngineMessage::Rewrite {
                input_path,
                output_path,
                codemod_name,
            } => {
                let old_text = std::fs::read_to_string(&input_path)
                    .map_err(|err| {
                        tracing::debug!(file = %input_path.display(), error = %err, "Input file unreadable");
                    })
                    .ok();
                let job = Job::rewrite_file(
                    &input_path,
                    &output_path,
                    &codemod_name,
                    old_text.as_deref(),
                );
                (codemod_name, job)
            }
            EngineMessage::Create {
                path,
                output_path,
                codemod_name,
            } => {
                let job = Job::create_file(&path, &output_path, &codemod_name);
                (codemod_name, job)
            }
        };

        let case = Case::new(CaseKind::RewriteFileByEngine, codemod_name);
        let registration = registry.register_job(case, job);
        if registration.is_created() {
            self.jobs_created += 1;
        }
        LineOutcome::Job(registration)
    }

    pub fn codemod_set_name(&self) -> &str {
        &self.codemod_set_name
    }

    pub fn total_file_count(&self) -> u64 {
        self.total_file_count
    }

    pub fn jobs_created(&self) -> usize {
        self.jobs_created
    }

    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }
}

/// How to launch one engine execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    /// Passed as `-g` when non-empty
    pub codemod_set_name: String,
    pub output_directory: PathBuf,
    pub file_limit: u32,
    pub working_directory: Option<PathBuf>,
}

impl EngineCommand {
    pub fn new(executable: impl Into<PathBuf>, config: &EngineConfig) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            codemod_set_name: String::new(),
            output_directory: config.output_directory.clone(),
            file_limit: config.file_limit,
            working_directory: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn codemod_set(mut self, name: impl Into<String>) -> Self {
        self.codemod_set_name = name.into();
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Caller-supplied arguments followed by the limit, group and output flags
    pub fn full_arguments(&self) -> Vec<String> {
        let mut args = self.arguments.clone();
        args.push("-l".to_string());
        args.push(self.file_limit.to_string());
        if !self.codemod_set_name.is_empty() {
            args.push("-g".to_string());
            args.push(self.codemod_set_name.clone());
        }
        args.push("-o".to_string());
        args.push(self.output_directory.display().to_string());
        args
    }
}

/// Stops a running execution from outside the session
#[derive(Debug, Clone)]
pub struct HaltHandle {
    halted: Arc<AtomicBool>,
    stdin: mpsc::UnboundedSender<&'static str>,
}

impl HaltHandle {
    /// Stop translating lines and ask the engine to shut down
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        if self.stdin.send(SHUTDOWN_COMMAND).is_err() {
            tracing::debug!("Engine stdin already closed");
        }
    }
}

type ActiveSlot = Arc<Mutex<Option<HaltHandle>>>;

/// Frees the coordinator's slot when the session ends, however it ends
struct SlotGuard(ActiveSlot);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
    }
}

/// Allows at most one live engine execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionCoordinator {
    active: ActiveSlot,
}

impl ExecutionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Halt the live execution; `false` when nothing is running
    pub fn halt(&self) -> bool {
        let handle = self.active.lock().ok().and_then(|slot| slot.clone());
        match handle {
            Some(handle) => {
                handle.halt();
                true
            }
            None => false,
        }
    }

    /// Spawn the engine. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        command: EngineCommand,
        progress: Box<dyn ProgressSink>,
    ) -> EngineResult<ExecutionSession> {
        let mut slot = self
            .active
            .lock()
            .map_err(|_| EngineError::Io(std::io::Error::other("execution slot poisoned")))?;
        if slot.is_some() {
            tracing::warn!(executable = %command.executable.display(), "Rejecting concurrent engine execution");
            return Err(EngineError::ExecutionInProgress);
        }

        std::fs::create_dir_all(&command.output_directory)?;

        let args = command.full_arguments();
        let mut cmd = Command::new(&command.executable);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| {
            tracing::error!(
                executable = %command.executable.display(),
                args = ?args,
                error = %source,
                "Failed to spawn engine"
            );
            EngineError::Spawn {
                executable: command.executable.clone(),
                source,
            }
        })?;

        let stdin = child.stdin.take().ok_or(EngineError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(EngineError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(EngineError::MissingPipe("stderr"))?;

        let execution_id = uuid::Uuid::new_v4().to_string();
        let span = recast_config::logging::execution_span(&execution_id);

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<&'static str>();
        tokio::spawn(
            async move {
                let mut stdin = stdin;
                while let Some(message) = stdin_rx.recv().await {
                    if let Err(err) = stdin.write_all(message.as_bytes()).await {
                        tracing::debug!(error = %err, "Failed to write to engine stdin");
                        break;
                    }
                    if let Err(err) = stdin.flush().await {
                        tracing::debug!(error = %err, "Failed to flush engine stdin");
                        break;
                    }
                }
            }
            .instrument(span.clone()),
        );

        tokio::spawn(
            async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "recast::engine::stderr", "{}", line);
                }
            }
            .instrument(span.clone()),
        );

        let consumer = EngineLineConsumer::new(command.codemod_set_name.clone(), progress);
        let halt = HaltHandle {
            halted: consumer.halt_flag(),
            stdin: stdin_tx,
        };
        *slot = Some(halt.clone());

        span.in_scope(|| {
            tracing::info!(
                executable = %command.executable.display(),
                pid = child.id(),
                codemod_set = %command.codemod_set_name,
                "Started engine execution"
            );
        });

        Ok(ExecutionSession {
            execution_id,
            started_at: Utc::now(),
            child,
            stdout,
            consumer,
            halt,
            span,
            _slot: SlotGuard(self.active.clone()),
        })
    }
}

/// Summary of a finished execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub codemod_set_name: String,
    pub halted: bool,
    /// Total file count last reported by the engine
    pub file_count: u64,
    pub jobs_created: usize,
    pub decode_failures: usize,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One live engine execution
pub struct ExecutionSession {
    execution_id: String,
    started_at: DateTime<Utc>,
    child: Child,
    stdout: ChildStdout,
    consumer: EngineLineConsumer,
    halt: HaltHandle,
    span: tracing::Span,
    _slot: SlotGuard,
}

impl ExecutionSession {
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Consume engine output until it closes stdout, registering jobs as they arrive
    pub async fn run(self, registry: &mut JobRegistry) -> EngineResult<ExecutionSummary> {
        let span = self.span.clone();
        self.run_inner(registry).instrument(span).await
    }

    async fn run_inner(mut self, registry: &mut JobRegistry) -> EngineResult<ExecutionSummary> {
        let mut lines = BufReader::new(self.stdout).lines();
        while let Some(line) = lines.next_line().await? {
            self.consumer.consume(&line, registry);
        }

        let status = self.child.wait().await?;
        self.consumer.progress.finished();

        let summary = ExecutionSummary {
            execution_id: self.execution_id,
            codemod_set_name: self.consumer.codemod_set_name().to_string(),
            halted: self.consumer.is_halted(),
            file_count: self.consumer.total_file_count(),
            jobs_created: self.consumer.jobs_created(),
            decode_failures: self.consumer.decode_failures(),
            exit_code: status.code(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            halted = summary.halted,
            file_count = summary.file_count,
            jobs_created = summary.jobs_created,
            decode_failures = summary.decode_failures,
            exit_code = ?summary.exit_code,
            "Engine execution finished"
        );
        Ok(summary)
    }
}

/// Remove everything the engine wrote into `output_directory`
pub async fn clear_output_files(output_directory: &Path) -> RecastResult<()> {
    match tokio::fs::remove_dir_all(output_directory).await {
        Ok(()) => {
            tracing::debug!(dir = %output_directory.display(), "Cleared engine output");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RecastError::io_at(output_directory, err)),
    }
}
