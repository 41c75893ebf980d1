//! In-memory note service.

use crate::client::{GetNoteOptions, NoteOrder, RemoteClient};
use crate::error::{RemoteError, RemoteResult};
use crate::limits::ServiceLimits;
use parking_lot::{Mutex, MutexGuard};
use quillsync_model::{
    enml, ContentHash, EntityKind, Guid, NoteList, RemoteNote, RemoteNotebook, RemoteResource,
    RemoteTag, Timestamp,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::trace;
use uuid::Uuid;

/// Remote operations, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_notebooks`
    ListNotebooks,
    /// `create_notebook`
    CreateNotebook,
    /// `update_notebook`
    UpdateNotebook,
    /// `expunge_notebook`
    ExpungeNotebook,
    /// `list_tags`
    ListTags,
    /// `create_tag`
    CreateTag,
    /// `update_tag`
    UpdateTag,
    /// `find_notes`
    FindNotes,
    /// `get_note`
    GetNote,
    /// `create_note`
    CreateNote,
    /// `update_note`
    UpdateNote,
    /// `delete_note`
    DeleteNote,
    /// `get_resource`
    GetResource,
}

#[derive(Default)]
struct ServiceState {
    notebooks: BTreeMap<Guid, RemoteNotebook>,
    tags: BTreeMap<Guid, RemoteTag>,
    notes: BTreeMap<Guid, RemoteNote>,
    clock: Timestamp,
    offline: bool,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    calls: HashMap<Operation, usize>,
}

impl ServiceState {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        self.clock
    }

    fn notebook_name_taken(&self, name: &str, except: Option<&Guid>) -> bool {
        self.notebooks
            .values()
            .any(|nb| nb.guid.as_ref() != except && nb.name.eq_ignore_ascii_case(name))
    }

    fn tag_name_taken(&self, name: &str, except: Option<&Guid>) -> bool {
        self.tags
            .values()
            .any(|tag| tag.guid.as_ref() != except && tag.name.eq_ignore_ascii_case(name))
    }

    fn default_notebook(&self) -> Option<Guid> {
        self.notebooks
            .values()
            .find(|nb| nb.default_notebook)
            .and_then(|nb| nb.guid.clone())
    }

    fn check_references(&self, note: &RemoteNote) -> RemoteResult<()> {
        if let Some(guid) = &note.notebook_guid {
            if !self.notebooks.contains_key(guid) {
                return Err(RemoteError::NotFound {
                    kind: EntityKind::Notebook,
                    guid: guid.clone(),
                });
            }
        }
        if let Some(guid) = note.tag_guids.iter().find(|g| !self.tags.contains_key(*g)) {
            return Err(RemoteError::NotFound {
                kind: EntityKind::Tag,
                guid: guid.clone(),
            });
        }
        Ok(())
    }
}

/// An in-memory `RemoteClient`.
///
/// Enforces the configured `ServiceLimits`, rejects duplicate notebook and
/// tag names (case-insensitively) and reports unknown guids as not found.
/// Every write advances a logical clock used for `service_updated` and
/// `updated` timestamps.
///
/// Seeding helpers (`seed_*`, `modify_*`, `remove_*`) act as another client
/// editing the account: they bypass fault injection and call accounting.
pub struct MemoryService {
    limits: ServiceLimits,
    state: Mutex<ServiceState>,
}

impl MemoryService {
    /// Creates an empty service with default limits.
    pub fn new() -> Self {
        Self::with_limits(ServiceLimits::default())
    }

    /// Creates an empty service with the given limits.
    pub fn with_limits(limits: ServiceLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(ServiceState {
                clock: 1_000,
                ..ServiceState::default()
            }),
        }
    }

    /// Returns the enforced limits.
    pub fn limits(&self) -> ServiceLimits {
        self.limits
    }

    /// Makes the next call of `operation` fail with `error`.
    ///
    /// Multiple failures queue up in order.
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Makes every call fail with a transient error while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Number of calls made to `operation`.
    pub fn calls(&self, operation: Operation) -> usize {
        self.state.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Number of calls made to any write operation.
    pub fn write_calls(&self) -> usize {
        const WRITES: [Operation; 8] = [
            Operation::CreateNotebook,
            Operation::UpdateNotebook,
            Operation::ExpungeNotebook,
            Operation::CreateTag,
            Operation::UpdateTag,
            Operation::CreateNote,
            Operation::UpdateNote,
            Operation::DeleteNote,
        ];
        let state = self.state.lock();
        WRITES
            .iter()
            .map(|op| state.calls.get(op).copied().unwrap_or(0))
            .sum()
    }

    /// Clears the call counters.
    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Adds a notebook as if another client had created it.
    pub fn seed_notebook(&self, name: &str) -> RemoteNotebook {
        let mut state = self.state.lock();
        let notebook = RemoteNotebook {
            guid: Some(new_guid()),
            name: name.to_string(),
            default_notebook: state.notebooks.is_empty(),
            service_updated: state.tick(),
        };
        insert_keyed(&mut state.notebooks, notebook)
    }

    /// Adds a tag as if another client had created it.
    pub fn seed_tag(&self, name: &str) -> RemoteTag {
        let mut state = self.state.lock();
        let tag = RemoteTag {
            guid: Some(new_guid()),
            name: name.to_string(),
        };
        insert_keyed(&mut state.tags, tag)
    }

    /// Adds a note as if another client had created it. `content` is the
    /// inner markup; the envelope is added here.
    pub fn seed_note(
        &self,
        title: &str,
        content: &str,
        notebook_guid: Option<&Guid>,
        tag_guids: &[Guid],
    ) -> RemoteNote {
        let mut state = self.state.lock();
        let now = state.tick();
        let note = RemoteNote {
            guid: Some(new_guid()),
            title: title.to_string(),
            content: enml::wrap(content, self.limits.note_content_len),
            created: now,
            updated: now,
            notebook_guid: notebook_guid.cloned().or_else(|| state.default_notebook()),
            tag_guids: tag_guids.to_vec(),
            resources: Vec::new(),
        };
        insert_keyed(&mut state.notes, note)
    }

    /// Attaches a resource to an existing note, bumping its `updated` time.
    ///
    /// Returns `None` if the note does not exist.
    pub fn seed_resource(
        &self,
        note_guid: &Guid,
        body: &[u8],
        mime: &str,
        file_name: &str,
    ) -> Option<RemoteResource> {
        let mut state = self.state.lock();
        let now = state.tick();
        let note = state.notes.get_mut(note_guid)?;
        let mut resource =
            RemoteResource::upload(Some(note_guid.clone()), body.to_vec(), mime, file_name);
        resource.guid = Some(new_guid());
        note.resources.push(resource.clone());
        note.updated = now;
        Some(resource)
    }

    /// Edits a note in place as another client would, bumping `updated`.
    pub fn modify_note(&self, guid: &Guid, edit: impl FnOnce(&mut RemoteNote)) -> bool {
        let mut state = self.state.lock();
        let now = state.tick();
        match state.notes.get_mut(guid) {
            Some(note) => {
                edit(note);
                note.updated = now;
                true
            }
            None => false,
        }
    }

    /// Edits a notebook in place as another client would, bumping
    /// `service_updated`.
    pub fn modify_notebook(&self, guid: &Guid, edit: impl FnOnce(&mut RemoteNotebook)) -> bool {
        let mut state = self.state.lock();
        let now = state.tick();
        match state.notebooks.get_mut(guid) {
            Some(notebook) => {
                edit(notebook);
                notebook.service_updated = now;
                true
            }
            None => false,
        }
    }

    /// Renames a tag as another client would.
    pub fn rename_tag(&self, guid: &Guid, name: &str) -> bool {
        match self.state.lock().tags.get_mut(guid) {
            Some(tag) => {
                tag.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes a notebook as another client would.
    pub fn remove_notebook(&self, guid: &Guid) -> bool {
        self.state.lock().notebooks.remove(guid).is_some()
    }

    /// Removes a note as another client would.
    pub fn remove_note(&self, guid: &Guid) -> bool {
        self.state.lock().notes.remove(guid).is_some()
    }

    /// Snapshot of all notebooks.
    pub fn notebooks(&self) -> Vec<RemoteNotebook> {
        self.state.lock().notebooks.values().cloned().collect()
    }

    /// Snapshot of all tags.
    pub fn tags(&self) -> Vec<RemoteTag> {
        self.state.lock().tags.values().cloned().collect()
    }

    /// Snapshot of all notes, with content and resource bodies.
    pub fn notes(&self) -> Vec<RemoteNote> {
        self.state.lock().notes.values().cloned().collect()
    }

    /// Full copy of one note.
    pub fn note(&self, guid: &Guid) -> Option<RemoteNote> {
        self.state.lock().notes.get(guid).cloned()
    }

    /// Locks the state for one call: counts it, then applies the offline
    /// switch and any queued failure.
    fn enter(&self, operation: Operation) -> RemoteResult<MutexGuard<'_, ServiceState>> {
        let mut state = self.state.lock();
        *state.calls.entry(operation).or_default() += 1;
        trace!(?operation, "remote call");
        if state.offline {
            return Err(RemoteError::transient("service unreachable"));
        }
        if let Some(error) = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state)
    }

    fn check_len(field: &str, value: &str, max: usize) -> RemoteResult<()> {
        let len = value.chars().count();
        if len > max {
            return Err(RemoteError::validation(
                field,
                format!("length {len} exceeds {max}"),
            ));
        }
        Ok(())
    }

    fn check_name(field: &str, value: &str, max: usize) -> RemoteResult<()> {
        if value.trim().is_empty() {
            return Err(RemoteError::validation(field, "must not be empty"));
        }
        Self::check_len(field, value, max)
    }

    fn check_note(&self, note: &RemoteNote) -> RemoteResult<()> {
        Self::check_name("note.title", &note.title, self.limits.note_title_len)?;
        Self::check_len("note.content", &note.content, self.limits.note_content_len)
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

trait Keyed {
    fn key(&self) -> Option<&Guid>;
}

impl Keyed for RemoteNotebook {
    fn key(&self) -> Option<&Guid> {
        self.guid.as_ref()
    }
}

impl Keyed for RemoteTag {
    fn key(&self) -> Option<&Guid> {
        self.guid.as_ref()
    }
}

impl Keyed for RemoteNote {
    fn key(&self) -> Option<&Guid> {
        self.guid.as_ref()
    }
}

fn insert_keyed<T: Keyed + Clone>(map: &mut BTreeMap<Guid, T>, value: T) -> T {
    if let Some(guid) = value.key() {
        map.insert(guid.clone(), value.clone());
    }
    value
}

fn new_guid() -> Guid {
    Guid::new(Uuid::new_v4().to_string())
}

fn require_guid(kind: EntityKind, guid: Option<&Guid>) -> RemoteResult<&Guid> {
    guid.ok_or_else(|| RemoteError::validation(format!("{kind}.guid"), "required for update"))
}

fn metadata_only(note: &RemoteNote) -> RemoteNote {
    RemoteNote {
        content: String::new(),
        resources: Vec::new(),
        ..note.clone()
    }
}

fn strip_body(resource: &RemoteResource) -> RemoteResource {
    RemoteResource {
        body: None,
        ..resource.clone()
    }
}

/// Resolves an incoming resource list against what the note already holds.
///
/// Bodies matching an existing hash keep that resource's guid; new bodies
/// get fresh guids; body-less entries must reference an existing resource.
fn merge_resources(
    note_guid: &Guid,
    existing: &[RemoteResource],
    incoming: &[RemoteResource],
) -> RemoteResult<Vec<RemoteResource>> {
    incoming
        .iter()
        .map(|resource| {
            let known = existing.iter().find(|old| match &resource.body {
                Some(body) => old.body_hash == ContentHash::of(body),
                None => old.guid.is_some() && old.guid == resource.guid,
            });
            match (known, &resource.body) {
                (Some(old), _) => Ok(RemoteResource {
                    mime: resource.mime.clone(),
                    file_name: resource.file_name.clone(),
                    ..old.clone()
                }),
                (None, Some(body)) => Ok(RemoteResource {
                    guid: Some(new_guid()),
                    note_guid: Some(note_guid.clone()),
                    mime: resource.mime.clone(),
                    file_name: resource.file_name.clone(),
                    body_hash: ContentHash::of(body),
                    body: Some(body.clone()),
                }),
                (None, None) => Err(RemoteError::validation(
                    "resource.data",
                    "new resources must carry a body",
                )),
            }
        })
        .collect()
}

impl RemoteClient for MemoryService {
    fn list_notebooks(&self) -> RemoteResult<Vec<RemoteNotebook>> {
        let state = self.enter(Operation::ListNotebooks)?;
        Ok(state.notebooks.values().cloned().collect())
    }

    fn create_notebook(&self, notebook: &RemoteNotebook) -> RemoteResult<RemoteNotebook> {
        let mut state = self.enter(Operation::CreateNotebook)?;
        Self::check_name(
            "notebook.name",
            &notebook.name,
            self.limits.notebook_name_len,
        )?;
        if state.notebook_name_taken(&notebook.name, None) {
            return Err(RemoteError::NameConflict {
                name: notebook.name.clone(),
            });
        }
        let created = RemoteNotebook {
            guid: Some(new_guid()),
            service_updated: state.tick(),
            ..notebook.clone()
        };
        Ok(insert_keyed(&mut state.notebooks, created))
    }

    fn update_notebook(&self, notebook: &RemoteNotebook) -> RemoteResult<RemoteNotebook> {
        let mut state = self.enter(Operation::UpdateNotebook)?;
        let guid = require_guid(EntityKind::Notebook, notebook.guid.as_ref())?;
        if !state.notebooks.contains_key(guid) {
            return Err(RemoteError::NotFound {
                kind: EntityKind::Notebook,
                guid: guid.clone(),
            });
        }
        Self::check_name(
            "notebook.name",
            &notebook.name,
            self.limits.notebook_name_len,
        )?;
        if state.notebook_name_taken(&notebook.name, Some(guid)) {
            return Err(RemoteError::NameConflict {
                name: notebook.name.clone(),
            });
        }
        let updated = RemoteNotebook {
            service_updated: state.tick(),
            ..notebook.clone()
        };
        Ok(insert_keyed(&mut state.notebooks, updated))
    }

    fn expunge_notebook(&self, guid: &Guid) -> RemoteResult<()> {
        let mut state = self.enter(Operation::ExpungeNotebook)?;
        if state.notebooks.remove(guid).is_none() {
            return Err(RemoteError::NotFound {
                kind: EntityKind::Notebook,
                guid: guid.clone(),
            });
        }
        state
            .notes
            .retain(|_, note| note.notebook_guid.as_ref() != Some(guid));
        Ok(())
    }

    fn list_tags(&self) -> RemoteResult<Vec<RemoteTag>> {
        let state = self.enter(Operation::ListTags)?;
        Ok(state.tags.values().cloned().collect())
    }

    fn create_tag(&self, tag: &RemoteTag) -> RemoteResult<RemoteTag> {
        let mut state = self.enter(Operation::CreateTag)?;
        Self::check_name("tag.name", &tag.name, self.limits.tag_name_len)?;
        if state.tag_name_taken(&tag.name, None) {
            return Err(RemoteError::NameConflict {
                name: tag.name.clone(),
            });
        }
        let created = RemoteTag {
            guid: Some(new_guid()),
            name: tag.name.clone(),
        };
        Ok(insert_keyed(&mut state.tags, created))
    }

    fn update_tag(&self, tag: &RemoteTag) -> RemoteResult<RemoteTag> {
        let mut state = self.enter(Operation::UpdateTag)?;
        let guid = require_guid(EntityKind::Tag, tag.guid.as_ref())?;
        if !state.tags.contains_key(guid) {
            return Err(RemoteError::NotFound {
                kind: EntityKind::Tag,
                guid: guid.clone(),
            });
        }
        Self::check_name("tag.name", &tag.name, self.limits.tag_name_len)?;
        if state.tag_name_taken(&tag.name, Some(guid)) {
            return Err(RemoteError::NameConflict {
                name: tag.name.clone(),
            });
        }
        Ok(insert_keyed(&mut state.tags, tag.clone()))
    }

    fn find_notes(&self, order: NoteOrder, offset: u32, limit: u32) -> RemoteResult<NoteList> {
        let state = self.enter(Operation::FindNotes)?;
        let mut notes: Vec<&RemoteNote> = state.notes.values().collect();
        match order {
            NoteOrder::UpdatedDesc => notes.sort_by(|a, b| {
                b.updated.cmp(&a.updated).then_with(|| a.guid.cmp(&b.guid))
            }),
        }
        let total_notes = u32::try_from(notes.len()).unwrap_or(u32::MAX);
        let limit = limit.min(self.limits.notes_per_request) as usize;
        let page = notes
            .into_iter()
            .skip(offset as usize)
            .take(limit)
            .map(metadata_only)
            .collect();
        Ok(NoteList {
            notes: page,
            start_index: offset,
            total_notes,
        })
    }

    fn get_note(&self, guid: &Guid, options: GetNoteOptions) -> RemoteResult<RemoteNote> {
        let state = self.enter(Operation::GetNote)?;
        let note = state.notes.get(guid).ok_or_else(|| RemoteError::NotFound {
            kind: EntityKind::Note,
            guid: guid.clone(),
        })?;
        let mut copy = metadata_only(note);
        if options.with_content {
            copy.content.clone_from(&note.content);
        }
        if options.with_resources {
            copy.resources = note.resources.iter().map(strip_body).collect();
        }
        Ok(copy)
    }

    fn create_note(&self, note: &RemoteNote) -> RemoteResult<RemoteNote> {
        let mut state = self.enter(Operation::CreateNote)?;
        self.check_note(note)?;
        state.check_references(note)?;
        let guid = new_guid();
        let resources = merge_resources(&guid, &[], &note.resources)?;
        let now = state.tick();
        let created = RemoteNote {
            guid: Some(guid),
            created: now,
            updated: now,
            notebook_guid: note
                .notebook_guid
                .clone()
                .or_else(|| state.default_notebook()),
            resources,
            ..note.clone()
        };
        insert_keyed(&mut state.notes, created.clone());
        Ok(RemoteNote {
            resources: created.resources.iter().map(strip_body).collect(),
            ..created
        })
    }

    fn update_note(&self, note: &RemoteNote) -> RemoteResult<RemoteNote> {
        let mut state = self.enter(Operation::UpdateNote)?;
        let guid = require_guid(EntityKind::Note, note.guid.as_ref())?.clone();
        let existing = state
            .notes
            .get(&guid)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                kind: EntityKind::Note,
                guid: guid.clone(),
            })?;
        self.check_note(note)?;
        state.check_references(note)?;
        let resources = merge_resources(&guid, &existing.resources, &note.resources)?;
        let updated = RemoteNote {
            guid: Some(guid),
            created: existing.created,
            updated: state.tick(),
            notebook_guid: note.notebook_guid.clone().or(existing.notebook_guid),
            resources,
            ..note.clone()
        };
        insert_keyed(&mut state.notes, updated.clone());
        Ok(RemoteNote {
            resources: updated.resources.iter().map(strip_body).collect(),
            ..updated
        })
    }

    fn delete_note(&self, guid: &Guid) -> RemoteResult<()> {
        let mut state = self.enter(Operation::DeleteNote)?;
        match state.notes.remove(guid) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound {
                kind: EntityKind::Note,
                guid: guid.clone(),
            }),
        }
    }

    fn get_resource(&self, guid: &Guid) -> RemoteResult<RemoteResource> {
        let state = self.enter(Operation::GetResource)?;
        state
            .notes
            .values()
            .flat_map(|note| note.resources.iter())
            .find(|resource| resource.guid.as_ref() == Some(guid))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                kind: EntityKind::Resource,
                guid: guid.clone(),
            })
    }
}
