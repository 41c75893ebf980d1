//! Sync engine: runs one push-then-pull cycle at a time.

use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::pull::{self, PullStats};
use crate::push::{self, PushStats};
use parking_lot::{Mutex, RwLock};
use quillsync_remote::RemoteClient;
use quillsync_store::LocalStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Whether a cycle is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No cycle in progress.
    #[default]
    Idle,
    /// A cycle is in progress.
    Syncing,
}

impl SyncState {
    /// Returns true while a cycle runs.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }
}

/// Statistics accumulated across cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that completed.
    pub cycles_completed: u64,
    /// Cycles that aborted.
    pub cycles_failed: u64,
    /// Remote writes performed by push phases.
    pub entities_pushed: u64,
    /// Local rows created or updated by pull phases.
    pub entities_pulled: u64,
    /// Local rows removed because the service no longer has them.
    pub entities_removed: u64,
    /// Notebook renames performed to resolve name conflicts.
    pub renames: u64,
    /// Completion time of the last successful cycle.
    pub last_sync_time: Option<Instant>,
    /// Message of the last abort.
    pub last_error: Option<String>,
}

/// Result of a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCycleResult {
    /// Push phase counters.
    pub push: PushStats,
    /// Pull phase counters.
    pub pull: PullStats,
    /// Wall time of the cycle.
    pub duration: Duration,
}

/// The sync engine reconciles a local store with a remote note service.
///
/// Cycles are serialised: a call to [`SyncEngine::sync`] made while another
/// is running waits for it to finish.
pub struct SyncEngine<R: RemoteClient + ?Sized, S: LocalStore> {
    config: SyncConfig,
    remote: Arc<R>,
    store: Arc<S>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cycle: Mutex<()>,
}

impl<R: RemoteClient + ?Sized, S: LocalStore> SyncEngine<R, S> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, remote: Arc<R>, store: Arc<S>) -> Self {
        Self {
            config,
            remote,
            store,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cycle: Mutex::new(()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Completion time of the last successful cycle.
    pub fn last_sync(&self) -> Option<Instant> {
        self.stats.read().last_sync_time
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote client.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Gets the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Performs a full cycle: push then pull.
    ///
    /// On failure the store is rolled back to its last commit, the error is
    /// recorded in the stats and returned.
    pub fn sync(&self) -> SyncResult<SyncCycleResult> {
        let _cycle = self.cycle.lock();
        self.set_state(SyncState::Syncing);
        let start = Instant::now();
        info!("sync cycle started");

        let outcome = self.run_cycle(start);
        match &outcome {
            Ok(result) => {
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.entities_pushed += result.push.total();
                stats.entities_pulled += result.pull.created + result.pull.updated;
                stats.entities_removed += result.pull.removed;
                stats.renames += result.push.renamed;
                stats.last_sync_time = Some(Instant::now());
                stats.last_error = None;
                info!(
                    pushed = result.push.total(),
                    pulled = result.pull.created + result.pull.updated,
                    removed = result.pull.removed,
                    duration_ms = result.duration.as_millis() as u64,
                    "sync cycle complete"
                );
            }
            Err(err) => {
                error!(error = %err, "sync cycle aborted");
                if let Err(rollback) = self.store.rollback() {
                    error!(error = %rollback, "rollback after aborted cycle failed");
                }
                let mut stats = self.stats.write();
                stats.cycles_failed += 1;
                stats.last_error = Some(err.to_string());
            }
        }

        self.set_state(SyncState::Idle);
        outcome
    }

    fn run_cycle(&self, start: Instant) -> SyncResult<SyncCycleResult> {
        let ctx = SyncContext::new(self.remote.as_ref(), self.store.as_ref(), &self.config);
        let push = push::push_all(&ctx)?;
        let pull = pull::pull_all(&ctx)?;
        Ok(SyncCycleResult {
            push,
            pull,
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillsync_model::{Action, Notebook, Tag};
    use quillsync_remote::{MemoryService, Operation, RemoteError};
    use quillsync_store::MemoryStore;

    fn engine() -> SyncEngine<MemoryService, MemoryStore> {
        SyncEngine::new(
            SyncConfig::default(),
            Arc::new(MemoryService::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn sync_state_transitions() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Syncing.is_active());
        assert_eq!(SyncState::default(), SyncState::Idle);
    }

    #[test]
    fn engine_initial_state() {
        let engine = engine();
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats().cycles_completed, 0);
        assert!(engine.last_sync().is_none());
    }

    #[test]
    fn successful_cycle_updates_stats() {
        let engine = engine();
        engine.store().insert(Notebook::new_local("Inbox")).unwrap();
        engine.store().commit().unwrap();

        let result = engine.sync().unwrap();
        assert_eq!(result.push.created, 1);

        let stats = engine.stats();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.entities_pushed, 1);
        assert!(stats.last_sync_time.is_some());
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[test]
    fn failed_cycle_rolls_back_and_records_error() {
        let engine = engine();
        let tag = engine.store().insert(Tag::new_local("work")).unwrap();
        engine.store().commit().unwrap();
        engine
            .remote()
            .fail_next(Operation::ListNotebooks, RemoteError::transient("timeout"));

        let err = engine.sync().unwrap_err();
        assert!(err.is_transient());

        let stats = engine.stats();
        assert_eq!(stats.cycles_failed, 1);
        assert!(stats.last_error.unwrap().contains("timeout"));
        assert_eq!(engine.state(), SyncState::Idle);
        // The tag push was committed before the pull failed.
        let stored: Tag = engine.store().get(tag.id).unwrap().unwrap();
        assert_eq!(stored.action, Action::None);
        assert!(!engine.store().has_uncommitted_changes());
    }
}
