//! Persisted registry state and the debounced writer

use crate::jobs::{Case, CaseHash, Job, JobHash};
use recast_foundation::{RecastError, RecastResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// The single JSON document holding registry state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub cases: Vec<Case>,
    pub case_hash_job_hashes: Vec<(CaseHash, JobHash)>,
    pub jobs: Vec<Job>,
    pub rejected_job_hashes: Vec<JobHash>,
}

/// Reads and replaces the state file
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as empty state
    pub async fn load(&self) -> RecastResult<PersistedState> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No persisted state");
                return Ok(PersistedState::default());
            }
            Err(err) => return Err(RecastError::io_at(&self.path, err)),
        };

        let state: PersistedState = serde_json::from_str(&text)?;
        tracing::debug!(
            path = %self.path.display(),
            jobs = state.jobs.len(),
            cases = state.cases.len(),
            "Loaded persisted state"
        );
        Ok(state)
    }

    /// Replace the whole document: write a sibling temp file, then rename it over
    pub async fn save(&self, state: &PersistedState) -> RecastResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| RecastError::io_at(parent, err))?;
        }

        let json = serde_json::to_vec(state)?;
        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, json)
            .await
            .map_err(|err| RecastError::io_at(&temp, err))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|err| RecastError::io_at(&self.path, err))?;

        tracing::debug!(path = %self.path.display(), jobs = state.jobs.len(), "Flushed state");
        Ok(())
    }

    pub async fn clear(&self) -> RecastResult<()> {
        self.save(&PersistedState::default()).await
    }
}

enum Command {
    Update(PersistedState),
    Flush(oneshot::Sender<RecastResult<()>>),
}

/// Coalesces state updates and writes the latest one once things go quiet
///
/// Every update marks the state dirty and restarts the delay. Writes happen
/// only when dirty; a failed write keeps the state dirty for the next attempt.
pub struct PersistenceWorker {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl PersistenceWorker {
    pub fn spawn(store: StateStore, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, delay, rx));
        Self { tx, task }
    }

    /// Record the latest state; it is written after `delay` without further updates
    pub fn update(&self, state: PersistedState) {
        if self.tx.send(Command::Update(state)).is_err() {
            tracing::warn!("Persistence worker has stopped; dropping state update");
        }
    }

    /// Write pending state now
    pub async fn flush(&self) -> RecastResult<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack))
            .map_err(|_| RecastError::internal("Persistence worker has stopped"))?;
        done.await
            .map_err(|_| RecastError::internal("Persistence worker dropped a flush request"))?
    }

    /// Flush pending state and stop the worker
    pub async fn shutdown(self) -> RecastResult<()> {
        let result = self.flush().await;
        drop(self.tx);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "Persistence worker task failed");
        }
        result
    }
}

async fn run(store: StateStore, delay: Duration, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut pending: Option<PersistedState> = None;

    loop {
        let command = if pending.is_some() {
            tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep(delay) => {
                    write_pending(&store, &mut pending).await.ok();
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Update(state)) => pending = Some(state),
            Some(Command::Flush(ack)) => {
                let _ = ack.send(write_pending(&store, &mut pending).await);
            }
            None => {
                write_pending(&store, &mut pending).await.ok();
                break;
            }
        }
    }
}

async fn write_pending(store: &StateStore, pending: &mut Option<PersistedState>) -> RecastResult<()> {
    let Some(state) = pending.as_ref() else {
        return Ok(());
    };
    match store.save(state).await {
        Ok(()) => {
            *pending = None;
            Ok(())
        }
        Err(err) => {
            tracing::error!(path = %store.path().display(), error = %err, "Failed to persist state");
            Err(err)
        }
    }
}
