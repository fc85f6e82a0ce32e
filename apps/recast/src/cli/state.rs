//! Registry state shared by every command run

use anyhow::Context;
use recast_config::AppConfig;
use recast_services::{JobRegistry, PersistenceWorker, RegistryEvent, StateStore};
use std::time::Duration;
use tokio::sync::mpsc;

/// The job registry of one command run, backed by the state file
///
/// Registry events are forwarded to the persistence worker; `close` flushes
/// whatever is still pending.
pub struct StateSession {
    pub registry: JobRegistry,
    events: mpsc::UnboundedReceiver<RegistryEvent>,
    worker: PersistenceWorker,
}

impl StateSession {
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let store = StateStore::new(&config.jobs.state_file);
        let state = store
            .load()
            .await
            .with_context(|| format!("Failed to load {}", store.path().display()))?;

        let mut registry = JobRegistry::from_persisted(state);
        let events = registry.subscribe();
        let worker = PersistenceWorker::spawn(
            store,
            Duration::from_millis(config.jobs.persist_debounce_ms),
        );

        Ok(Self {
            registry,
            events,
            worker,
        })
    }

    /// Hand the current state to the worker if the registry changed since the last sync
    pub fn sync(&mut self) {
        let mut changed = 0usize;
        while self.events.try_recv().is_ok() {
            changed += 1;
        }
        if changed > 0 {
            tracing::debug!(events = changed, "Registry changed");
            self.worker.update(self.registry.to_persisted());
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.sync();
        self.worker
            .shutdown()
            .await
            .context("Failed to persist job state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_services::{Case, CaseKind, Job, PersistedState};
    use std::path::Path;

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.jobs.state_file = dir.join(".recast/localState.json");
        config.jobs.persist_debounce_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_changes_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let mut session = StateSession::open(&config).await.unwrap();
        let registration = session.registry.register_job(
            Case::new(CaseKind::ApplyAstChanges, ""),
            Job::ast_change(Path::new("/p/a.ts"), "classSplit", "old", "new"),
        );
        session.close().await.unwrap();

        let reopened = StateSession::open(&config).await.unwrap();
        assert!(reopened.registry.get(registration.hash()).is_some());
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_untouched_registry_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let session = StateSession::open(&config).await.unwrap();
        session.close().await.unwrap();

        assert!(!config.jobs.state_file.exists());
        let store = StateStore::new(&config.jobs.state_file);
        assert_eq!(store.load().await.unwrap(), PersistedState::default());
    }
}
