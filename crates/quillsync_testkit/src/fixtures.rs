//! Test fixtures.
//!
//! `SyncFixture` wires an in-memory note service, an in-memory store and a
//! sync engine together, with a temporary directory for resource bodies.

use quillsync_model::{Guid, LocalId, Note, Notebook, Record, Resource, Tag};
use quillsync_remote::{MemoryService, ServiceLimits};
use quillsync_store::{LocalStore, MemoryStore};
use quillsync_sync_engine::{SyncConfig, SyncCycleResult, SyncEngine, SyncResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// An engine over an in-memory service and store, with automatic cleanup.
pub struct SyncFixture {
    /// The fake note service.
    pub service: Arc<MemoryService>,
    /// The local store.
    pub store: Arc<MemoryStore>,
    /// The engine under test.
    pub engine: SyncEngine<MemoryService, MemoryStore>,
    config: SyncConfig,
    _temp_dir: TempDir,
}

impl SyncFixture {
    /// Creates a fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Creates a fixture whose configuration is adjusted by `configure`.
    ///
    /// The service enforces the same limits as the configuration.
    pub fn with_config(configure: impl FnOnce(SyncConfig) -> SyncConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(SyncConfig::new(temp_dir.path().join("resources")));
        let service = Arc::new(MemoryService::with_limits(config.limits));
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::new(config.clone(), Arc::clone(&service), Arc::clone(&store));
        Self {
            service,
            store,
            engine,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Creates a fixture with the given service limits.
    pub fn with_limits(limits: ServiceLimits) -> Self {
        Self::with_config(|config| config.with_limits(limits))
    }

    /// Builds another engine sharing this fixture's service and store.
    pub fn spawn_engine(&self) -> SyncEngine<MemoryService, MemoryStore> {
        SyncEngine::new(
            self.config.clone(),
            Arc::clone(&self.service),
            Arc::clone(&self.store),
        )
    }

    /// Returns the configuration the engine was built with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns where pulled resource bodies are written.
    pub fn resource_dir(&self) -> &Path {
        &self.config.resource_dir
    }

    /// Runs a cycle, panicking on failure.
    pub fn sync(&self) -> SyncCycleResult {
        self.engine.sync().expect("sync cycle failed")
    }

    /// Runs a cycle.
    pub fn try_sync(&self) -> SyncResult<SyncCycleResult> {
        self.engine.sync()
    }

    /// Inserts and commits a record.
    pub fn insert<R: Record>(&self, record: R) -> R {
        let record = self.store.insert(record).expect("Failed to insert record");
        self.store.commit().expect("Failed to commit");
        record
    }

    /// Replaces and commits a record.
    pub fn update<R: Record>(&self, record: &R) {
        self.store.update(record).expect("Failed to update record");
        self.store.commit().expect("Failed to commit");
    }

    /// Creates a local notebook awaiting push.
    pub fn local_notebook(&self, name: &str) -> Notebook {
        self.insert(Notebook::new_local(name))
    }

    /// Creates a local tag awaiting push.
    pub fn local_tag(&self, name: &str) -> Tag {
        self.insert(Tag::new_local(name))
    }

    /// Creates a local note awaiting push.
    pub fn local_note(&self, title: &str, content: &str) -> Note {
        self.insert(Note::new_local(title, content))
    }

    /// Writes `body` to a local file and attaches it to a note.
    pub fn local_resource(&self, note_id: LocalId, file_name: &str, body: &[u8]) -> Resource {
        let path = self.local_file(file_name, body);
        self.insert(Resource::new_local(note_id, file_name, path, "application/octet-stream"))
    }

    /// Writes a file outside the resource directory.
    pub fn local_file(&self, file_name: &str, body: &[u8]) -> PathBuf {
        let dir = self._temp_dir.path().join("local");
        fs::create_dir_all(&dir).expect("Failed to create local file directory");
        let path = dir.join(file_name);
        fs::write(&path, body).expect("Failed to write local file");
        path
    }

    /// Gets a committed record by local ID.
    pub fn get<R: Record>(&self, id: LocalId) -> Option<R> {
        self.committed::<R>().into_iter().find(|record| record.id() == id)
    }

    /// Finds a committed record by guid.
    pub fn find<R: Record>(&self, guid: &Guid) -> Option<R> {
        self.committed::<R>()
            .into_iter()
            .find(|record| record.guid() == Some(guid))
    }

    /// Returns the committed attachments of a note.
    pub fn resources_of(&self, note_id: LocalId) -> Vec<Resource> {
        self.committed::<Resource>()
            .into_iter()
            .filter(|resource| resource.note_id == note_id)
            .collect()
    }

    /// Returns every committed record of a collection.
    pub fn committed<R: Record>(&self) -> Vec<R> {
        self.store.committed::<R>().expect("Failed to read store")
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_shares_service_and_store() {
        let fixture = SyncFixture::new();
        fixture.service.seed_notebook("Inbox");
        let notebook = fixture.local_notebook("Local");

        fixture.sync();

        assert!(fixture.get::<Notebook>(notebook.id).unwrap().guid.is_some());
        assert_eq!(fixture.committed::<Notebook>().len(), 2);
        assert_eq!(fixture.service.notebooks().len(), 2);
    }

    #[test]
    fn local_resource_writes_file() {
        let fixture = SyncFixture::new();
        let note = fixture.local_note("n", "c");
        let resource = fixture.local_resource(note.id, "a.bin", b"abc");
        assert_eq!(fs::read(&resource.file_path).unwrap(), b"abc");
        assert!(!resource.file_path.starts_with(fixture.resource_dir()));
    }
}
