//! Background scheduling of sync cycles.
//!
//! A single worker thread owns the periodic timer. Requests coalesce into
//! one pending flag: however many triggers arrive while a cycle runs, at
//! most one more cycle follows it.

use crate::config::SyncInterval;
use crate::error::{SyncError, SyncResult};
use crate::state::{SyncCycleResult, SyncEngine, SyncState, SyncStats};
use parking_lot::{Condvar, Mutex};
use quillsync_remote::RemoteClient;
use quillsync_store::LocalStore;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

struct Control {
    pending: bool,
    interval: SyncInterval,
    deadline: Option<Instant>,
    paused: bool,
    shutdown: bool,
}

impl Control {
    fn rearm(&mut self) {
        self.deadline = self.interval.period().map(|period| Instant::now() + period);
    }
}

struct Shared<R: RemoteClient + ?Sized, S: LocalStore> {
    engine: SyncEngine<R, S>,
    control: Mutex<Control>,
    wake: Condvar,
}

/// Runs sync cycles on a worker thread, on a timer and on demand.
pub struct SyncOrchestrator<R: RemoteClient + ?Sized + 'static, S: LocalStore + 'static> {
    shared: Arc<Shared<R, S>>,
    worker: Option<JoinHandle<()>>,
}

impl<R: RemoteClient + ?Sized + 'static, S: LocalStore + 'static> SyncOrchestrator<R, S> {
    /// Starts the worker. The first cycle runs immediately; the schedule is
    /// taken from the engine's configuration.
    pub fn start(engine: SyncEngine<R, S>) -> SyncResult<Self> {
        let interval = engine.config().interval;
        let shared = Arc::new(Shared {
            engine,
            control: Mutex::new(Control {
                pending: true,
                interval,
                deadline: None,
                paused: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("quillsync-worker".into())
            .spawn(move || run_worker(&worker_shared))
            .map_err(SyncError::WorkerSpawn)?;
        info!(?interval, "sync worker started");

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Requests a cycle without waiting for it. Requests made while one is
    /// already pending are merged into it.
    pub fn trigger_sync(&self) {
        let mut control = self.shared.control.lock();
        control.pending = true;
        self.shared.wake.notify_one();
    }

    /// Runs a cycle on the calling thread and returns its result.
    ///
    /// The timer is held while the cycle runs and re-armed from its end. If
    /// the worker is mid-cycle, this waits for it first.
    pub fn force_sync(&self) -> SyncResult<SyncCycleResult> {
        self.shared.control.lock().paused = true;
        let result = self.shared.engine.sync();
        let mut control = self.shared.control.lock();
        control.paused = false;
        control.rearm();
        self.shared.wake.notify_one();
        result
    }

    /// Changes the schedule. The timer restarts from now.
    pub fn set_interval(&self, interval: SyncInterval) {
        let mut control = self.shared.control.lock();
        control.interval = interval;
        control.rearm();
        debug!(?interval, "sync interval changed");
        self.shared.wake.notify_one();
    }

    /// Gets the current schedule.
    pub fn interval(&self) -> SyncInterval {
        self.shared.control.lock().interval
    }

    /// Gets the engine state.
    pub fn status(&self) -> SyncState {
        self.shared.engine.state()
    }

    /// Gets accumulated statistics.
    pub fn stats(&self) -> SyncStats {
        self.shared.engine.stats()
    }

    /// Completion time of the last successful cycle.
    pub fn last_sync(&self) -> Option<Instant> {
        self.shared.engine.last_sync()
    }

    /// Gets the engine.
    pub fn engine(&self) -> &SyncEngine<R, S> {
        &self.shared.engine
    }

    /// Stops the worker after any running cycle and waits for it to exit.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        {
            let mut control = self.shared.control.lock();
            control.shutdown = true;
            self.shared.wake.notify_all();
        }
        if worker.join().is_err() {
            error!("sync worker panicked");
        }
        info!("sync worker stopped");
    }
}

impl<R: RemoteClient + ?Sized + 'static, S: LocalStore + 'static> Drop for SyncOrchestrator<R, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<R: RemoteClient + ?Sized, S: LocalStore>(shared: &Shared<R, S>) {
    loop {
        {
            let mut control = shared.control.lock();
            loop {
                if control.shutdown {
                    return;
                }
                if control.pending {
                    control.pending = false;
                    break;
                }
                match control.deadline {
                    Some(deadline) if !control.paused => {
                        if Instant::now() >= deadline {
                            break;
                        }
                        shared.wake.wait_until(&mut control, deadline);
                    }
                    _ => shared.wake.wait(&mut control),
                }
            }
        }

        // Errors are logged and recorded by the engine; the next cycle
        // retries from scratch.
        let _ = shared.engine.sync();

        shared.control.lock().rearm();
    }
}
