//! Tests for background scheduling.

use parking_lot::{Condvar, Mutex};
use quillsync_model::{
    Action, Guid, Note, NoteList, RemoteNote, RemoteNotebook, RemoteResource, RemoteTag, Tag,
};
use quillsync_remote::{
    GetNoteOptions, MemoryService, NoteOrder, Operation, RemoteClient, RemoteError, RemoteResult,
};
use quillsync_sync_engine::{SyncEngine, SyncInterval, SyncOrchestrator, SyncState};
use quillsync_testkit::{init_tracing, SyncFixture};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn manual_fixture() -> SyncFixture {
    SyncFixture::with_config(|config| config.with_interval(SyncInterval::Manual))
}

#[test]
fn start_runs_an_initial_cycle() {
    init_tracing();
    let fixture = manual_fixture();
    let tag = fixture.local_tag("inbox");

    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));
    assert_eq!(fixture.get::<Tag>(tag.id).unwrap().action, Action::None);
    assert!(orchestrator.last_sync().is_some());
}

#[test]
fn manual_interval_only_syncs_on_request() {
    let fixture = manual_fixture();
    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(orchestrator.stats().cycles_completed, 1);

    orchestrator.trigger_sync();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 2
    }));
}

/// Delegates to a [`MemoryService`], holding each cycle at its notebook listing
/// while the gate is closed.
struct GatedService {
    inner: Arc<MemoryService>,
    gate: Mutex<Gate>,
    changed: Condvar,
}

#[derive(Default)]
struct Gate {
    closed: bool,
    held: bool,
}

impl GatedService {
    fn new(inner: Arc<MemoryService>) -> Self {
        Self {
            inner,
            gate: Mutex::new(Gate::default()),
            changed: Condvar::new(),
        }
    }

    fn close(&self) {
        self.gate.lock().closed = true;
    }

    fn open(&self) {
        self.gate.lock().closed = false;
        self.changed.notify_all();
    }

    /// Waits until a cycle is held at the gate.
    fn wait_held(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.gate.lock();
        while !gate.held {
            if self.changed.wait_until(&mut gate, deadline).timed_out() {
                return gate.held;
            }
        }
        true
    }
}

impl RemoteClient for GatedService {
    fn list_notebooks(&self) -> RemoteResult<Vec<RemoteNotebook>> {
        {
            let mut gate = self.gate.lock();
            if gate.closed {
                gate.held = true;
                self.changed.notify_all();
                while gate.closed {
                    self.changed.wait(&mut gate);
                }
                gate.held = false;
            }
        }
        self.inner.list_notebooks()
    }

    fn create_notebook(&self, notebook: &RemoteNotebook) -> RemoteResult<RemoteNotebook> {
        self.inner.create_notebook(notebook)
    }

    fn update_notebook(&self, notebook: &RemoteNotebook) -> RemoteResult<RemoteNotebook> {
        self.inner.update_notebook(notebook)
    }

    fn expunge_notebook(&self, guid: &Guid) -> RemoteResult<()> {
        self.inner.expunge_notebook(guid)
    }

    fn list_tags(&self) -> RemoteResult<Vec<RemoteTag>> {
        self.inner.list_tags()
    }

    fn create_tag(&self, tag: &RemoteTag) -> RemoteResult<RemoteTag> {
        self.inner.create_tag(tag)
    }

    fn update_tag(&self, tag: &RemoteTag) -> RemoteResult<RemoteTag> {
        self.inner.update_tag(tag)
    }

    fn find_notes(&self, order: NoteOrder, offset: u32, limit: u32) -> RemoteResult<NoteList> {
        self.inner.find_notes(order, offset, limit)
    }

    fn get_note(&self, guid: &Guid, options: GetNoteOptions) -> RemoteResult<RemoteNote> {
        self.inner.get_note(guid, options)
    }

    fn create_note(&self, note: &RemoteNote) -> RemoteResult<RemoteNote> {
        self.inner.create_note(note)
    }

    fn update_note(&self, note: &RemoteNote) -> RemoteResult<RemoteNote> {
        self.inner.update_note(note)
    }

    fn delete_note(&self, guid: &Guid) -> RemoteResult<()> {
        self.inner.delete_note(guid)
    }

    fn get_resource(&self, guid: &Guid) -> RemoteResult<RemoteResource> {
        self.inner.get_resource(guid)
    }
}

#[test]
fn triggers_during_a_cycle_merge_into_one() {
    let fixture = manual_fixture();
    let service = Arc::new(GatedService::new(Arc::clone(&fixture.service)));
    let engine = SyncEngine::new(
        fixture.config().clone(),
        Arc::clone(&service),
        Arc::clone(&fixture.store),
    );
    let orchestrator = SyncOrchestrator::start(engine).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));

    service.close();
    orchestrator.trigger_sync();
    assert!(service.wait_held(Duration::from_secs(5)));
    assert_eq!(orchestrator.status(), SyncState::Syncing);

    for _ in 0..20 {
        orchestrator.trigger_sync();
    }
    service.open();

    // The held cycle finishes, then exactly one more runs for the triggers.
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 3
    }));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(orchestrator.stats().cycles_completed, 3);
    assert_eq!(fixture.service.calls(Operation::ListNotebooks), 3);
}

#[test]
fn periodic_interval_fires() {
    let fixture = SyncFixture::with_config(|config| {
        config.with_interval(SyncInterval::Every(Duration::from_millis(10)))
    });
    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed >= 3
    }));
}

#[test]
fn set_interval_switches_schedule() {
    let fixture = manual_fixture();
    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));

    orchestrator.set_interval(SyncInterval::Every(Duration::from_millis(10)));
    assert_eq!(
        orchestrator.interval(),
        SyncInterval::Every(Duration::from_millis(10))
    );
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed >= 3
    }));

    orchestrator.set_interval(SyncInterval::Manual);
    // Let any cycle already under way finish.
    thread::sleep(Duration::from_millis(50));
    let settled = orchestrator.stats().cycles_completed;
    thread::sleep(Duration::from_millis(60));
    assert_eq!(orchestrator.stats().cycles_completed, settled);
}

#[test]
fn force_sync_runs_on_caller_thread() {
    let fixture = manual_fixture();
    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));

    let note = fixture.local_note("now", "");
    let result = orchestrator.force_sync().unwrap();
    assert_eq!(result.push.created, 1);
    assert!(fixture.get::<Note>(note.id).unwrap().guid.is_some());
    assert_eq!(orchestrator.stats().cycles_completed, 2);
}

#[test]
fn force_sync_reports_failure() {
    let fixture = manual_fixture();
    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));

    fixture
        .service
        .fail_next(Operation::ListTags, RemoteError::transient("timeout"));
    assert!(orchestrator.force_sync().is_err());
    let stats = orchestrator.stats();
    assert_eq!(stats.cycles_failed, 1);
    assert!(stats.last_error.is_some());
    assert_eq!(orchestrator.status(), SyncState::Idle);
}

#[test]
fn failed_cycles_do_not_stop_the_worker() {
    let fixture = manual_fixture();
    fixture.service.set_offline(true);
    let orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_failed == 1
    }));

    fixture.service.set_offline(false);
    orchestrator.trigger_sync();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));
}

#[test]
fn shutdown_stops_the_worker() {
    let fixture = manual_fixture();
    let mut orchestrator = SyncOrchestrator::start(fixture.spawn_engine()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        orchestrator.stats().cycles_completed == 1
    }));

    orchestrator.shutdown();
    orchestrator.trigger_sync();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(orchestrator.stats().cycles_completed, 1);

    // A second shutdown (and the drop) are no-ops.
    orchestrator.shutdown();
}
