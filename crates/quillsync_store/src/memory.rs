//! In-memory store with optional snapshot persistence.

use crate::error::{StoreError, StoreResult};
use crate::store::LocalStore;
use parking_lot::Mutex;
use quillsync_model::{AnyRecord, EntityKind, Guid, LocalId, Record, Resource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Tables {
    next_id: u64,
    rows: BTreeMap<EntityKind, BTreeMap<LocalId, AnyRecord>>,
}

impl Tables {
    fn collection(&self, kind: EntityKind) -> impl Iterator<Item = &AnyRecord> {
        self.rows.get(&kind).into_iter().flat_map(BTreeMap::values)
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<LocalId, AnyRecord> {
        self.rows.entry(kind).or_default()
    }

    fn typed<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.collection(R::KIND)
            .map(|row| {
                R::from_any_ref(row).cloned().ok_or_else(|| StoreError::Corrupt {
                    message: format!("{} row stored under {}", row.kind(), R::KIND),
                })
            })
            .collect()
    }

    fn drop_resources_of(&mut self, note_ids: &HashSet<LocalId>) {
        if note_ids.is_empty() {
            return;
        }
        self.collection_mut(EntityKind::Resource).retain(|_, row| match row {
            AnyRecord::Resource(resource) => !note_ids.contains(&resource.note_id),
            _ => true,
        });
    }
}

struct State {
    committed: Tables,
    working: Tables,
}

/// An in-memory `LocalStore`.
///
/// When opened with a path, the committed tables are written as a CBOR
/// snapshot after every commit and reloaded on open, so a crash loses at
/// most the transaction in progress.
pub struct MemoryStore {
    state: Mutex<State>,
    path: Option<PathBuf>,
    commits: Mutex<u64>,
}

impl MemoryStore {
    /// Creates an empty, purely in-memory store.
    pub fn new() -> Self {
        Self::from_tables(Tables::default(), None)
    }

    /// Opens a store backed by a snapshot file, creating it on first commit.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            ciborium::from_reader(reader).map_err(|e| StoreError::Codec(e.to_string()))?
        } else {
            Tables::default()
        };
        Ok(Self::from_tables(tables, Some(path)))
    }

    fn from_tables(tables: Tables, path: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(State {
                committed: tables.clone(),
                working: tables,
            }),
            path,
            commits: Mutex::new(0),
        }
    }

    /// Returns the snapshot path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of commits that published changes.
    pub fn commit_count(&self) -> u64 {
        *self.commits.lock()
    }

    /// Returns the committed rows of a collection, ignoring the open
    /// transaction.
    pub fn committed<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.state.lock().committed.typed()
    }

    /// Returns true if the open transaction holds unpublished changes.
    pub fn has_uncommitted_changes(&self) -> bool {
        let state = self.state.lock();
        state.working != state.committed
    }

    fn write_snapshot(path: &Path, tables: &Tables) -> StoreResult<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            ciborium::into_writer(tables, &mut writer)
                .map_err(|e| StoreError::Codec(e.to_string()))?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn get<R: Record>(&self, id: LocalId) -> StoreResult<Option<R>> {
        let state = self.state.lock();
        Ok(state
            .working
            .rows
            .get(&R::KIND)
            .and_then(|rows| rows.get(&id))
            .and_then(R::from_any_ref)
            .cloned())
    }

    fn find_by_guid<R: Record>(&self, guid: &Guid) -> StoreResult<Option<R>> {
        let state = self.state.lock();
        let found = state
            .working
            .collection(R::KIND)
            .filter_map(R::from_any_ref)
            .find(|record| record.guid() == Some(guid))
            .cloned();
        Ok(found)
    }

    fn all<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.state.lock().working.typed()
    }

    fn insert<R: Record>(&self, mut record: R) -> StoreResult<R> {
        let mut state = self.state.lock();
        state.working.next_id += 1;
        let id = LocalId::new(state.working.next_id);
        record.set_id(id);
        state
            .working
            .collection_mut(R::KIND)
            .insert(id, record.clone().into_any());
        Ok(record)
    }

    fn update<R: Record>(&self, record: &R) -> StoreResult<()> {
        let mut state = self.state.lock();
        let rows = state.working.collection_mut(R::KIND);
        match rows.get_mut(&record.id()) {
            Some(row) => {
                *row = record.clone().into_any();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: R::KIND,
                id: record.id(),
            }),
        }
    }

    fn delete<R: Record>(&self, id: LocalId) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let removed = state.working.collection_mut(R::KIND).remove(&id).is_some();
        if removed && R::KIND == EntityKind::Note {
            state.working.drop_resources_of(&HashSet::from([id]));
        }
        Ok(removed)
    }

    fn delete_except<R: Record>(&self, keep: &HashSet<LocalId>) -> StoreResult<usize> {
        let mut state = self.state.lock();
        let rows = state.working.collection_mut(R::KIND);
        let doomed: HashSet<LocalId> = rows
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();
        rows.retain(|id, _| !doomed.contains(id));
        if R::KIND == EntityKind::Note {
            state.working.drop_resources_of(&doomed);
        }
        Ok(doomed.len())
    }

    fn resources_for_note(&self, note_id: LocalId) -> StoreResult<Vec<Resource>> {
        let state = self.state.lock();
        Ok(state
            .working
            .collection(EntityKind::Resource)
            .filter_map(Resource::from_any_ref)
            .filter(|resource| resource.note_id == note_id)
            .cloned()
            .collect())
    }

    fn delete_note_resources_except(
        &self,
        note_id: LocalId,
        keep: &HashSet<LocalId>,
    ) -> StoreResult<usize> {
        let mut state = self.state.lock();
        let rows = state.working.collection_mut(EntityKind::Resource);
        let before = rows.len();
        rows.retain(|id, row| match row {
            AnyRecord::Resource(resource) => resource.note_id != note_id || keep.contains(id),
            _ => true,
        });
        Ok(before - rows.len())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.working == state.committed {
            return Ok(());
        }
        if let Some(path) = &self.path {
            Self::write_snapshot(path, &state.working)?;
        }
        state.committed = state.working.clone();
        *self.commits.lock() += 1;
        debug!(next_id = state.committed.next_id, "store committed");
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.working = state.committed.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillsync_model::{Action, Note, Notebook, Tag};
    use tempfile::TempDir;

    #[test]
    fn insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.insert(Tag::new_local("a")).unwrap();
        let b = store.insert(Notebook::new_local("b")).unwrap();
        assert_eq!(a.id, LocalId::new(1));
        assert_eq!(b.id, LocalId::new(2));
        assert_eq!(store.get::<Tag>(a.id).unwrap(), Some(a));
        assert!(store.get::<Notebook>(LocalId::new(1)).unwrap().is_none());
    }

    #[test]
    fn find_by_guid_and_pending() {
        let store = MemoryStore::new();
        let mut tag = store.insert(Tag::new_local("work")).unwrap();
        tag.guid = Some(Guid::new("g1"));
        tag.action = Action::None;
        store.update(&tag).unwrap();
        store.insert(Tag::new_local("home")).unwrap();

        let found: Tag = store.find_by_guid(&Guid::new("g1")).unwrap().unwrap();
        assert_eq!(found.name, "work");
        assert!(store.find_by_guid::<Tag>(&Guid::new("g2")).unwrap().is_none());

        let pending = store.pending::<Tag>().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "home");
    }

    #[test]
    fn update_missing_row_fails() {
        let store = MemoryStore::new();
        let mut tag = Tag::new_local("ghost");
        tag.id = LocalId::new(42);
        assert!(matches!(
            store.update(&tag),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn rollback_discards_uncommitted_changes() {
        let store = MemoryStore::new();
        store.insert(Notebook::new_local("kept")).unwrap();
        store.commit().unwrap();

        store.insert(Notebook::new_local("lost")).unwrap();
        assert!(store.has_uncommitted_changes());
        store.rollback().unwrap();

        let names: Vec<_> = store
            .all::<Notebook>()
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["kept"]);
        assert!(!store.has_uncommitted_changes());
    }

    #[test]
    fn empty_commit_is_not_counted() {
        let store = MemoryStore::new();
        store.commit().unwrap();
        assert_eq!(store.commit_count(), 0);
        store.insert(Tag::new_local("x")).unwrap();
        store.commit().unwrap();
        store.commit().unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn deleting_note_cascades_to_resources() {
        let store = MemoryStore::new();
        let note = store.insert(Note::new_local("n", "")).unwrap();
        let other = store.insert(Note::new_local("m", "")).unwrap();
        store
            .insert(Resource::new_local(note.id, "a.png", "/tmp/a.png", "image/png"))
            .unwrap();
        store
            .insert(Resource::new_local(other.id, "b.png", "/tmp/b.png", "image/png"))
            .unwrap();

        assert!(store.delete::<Note>(note.id).unwrap());
        assert!(store.resources_for_note(note.id).unwrap().is_empty());
        assert_eq!(store.resources_for_note(other.id).unwrap().len(), 1);
        assert!(!store.delete::<Note>(note.id).unwrap());
    }

    #[test]
    fn delete_except_keeps_listed_ids() {
        let store = MemoryStore::new();
        let a = store.insert(Notebook::new_local("a")).unwrap();
        store.insert(Notebook::new_local("b")).unwrap();
        store.insert(Notebook::new_local("c")).unwrap();

        let deleted = store.delete_except::<Notebook>(&HashSet::from([a.id])).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.all::<Notebook>().unwrap(), vec![a]);
    }

    #[test]
    fn delete_note_resources_except_is_scoped() {
        let store = MemoryStore::new();
        let note = store.insert(Note::new_local("n", "")).unwrap();
        let other = store.insert(Note::new_local("m", "")).unwrap();
        let keep = store
            .insert(Resource::new_local(note.id, "a", "/a", "text/plain"))
            .unwrap();
        store
            .insert(Resource::new_local(note.id, "b", "/b", "text/plain"))
            .unwrap();
        store
            .insert(Resource::new_local(other.id, "c", "/c", "text/plain"))
            .unwrap();

        let deleted = store
            .delete_note_resources_except(note.id, &HashSet::from([keep.id]))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.resources_for_note(note.id).unwrap(), vec![keep]);
        assert_eq!(store.resources_for_note(other.id).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.cbor");

        {
            let store = MemoryStore::open(&path).unwrap();
            store.insert(Notebook::new_local("persisted")).unwrap();
            store.commit().unwrap();
            store.insert(Notebook::new_local("uncommitted")).unwrap();
        }

        let reopened = MemoryStore::open(&path).unwrap();
        let names: Vec<_> = reopened
            .all::<Notebook>()
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["persisted"]);

        let next = reopened.insert(Tag::new_local("t")).unwrap();
        assert_eq!(next.id, LocalId::new(2));
    }

    #[test]
    fn corrupt_snapshot_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.cbor");
        fs::write(&path, b"\xff\xff not cbor").unwrap();
        assert!(matches!(MemoryStore::open(&path), Err(StoreError::Codec(_))));
    }
}
