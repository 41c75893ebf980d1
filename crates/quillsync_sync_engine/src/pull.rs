//! Pull phase: merges the service's state into the local store.
//!
//! Notebooks and tags are listed in full; notes are paged newest first and
//! only fetched in full when the local copy is missing or older. Resource
//! bodies are fetched only when their hash changed.
//!
//! Rows the service no longer lists are removed, but only when the listing
//! observed at least one entity of that kind, and never rows that were
//! created locally and are still waiting to be pushed.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use quillsync_model::{
    Guid, LocalId, Note, NoteList, Notebook, Record, RemoteNote, RemoteNotebook, RemoteResource,
    RemoteTag, Resource, Tag,
};
use quillsync_remote::{GetNoteOptions, NoteOrder, RemoteClient, RemoteResult};
use quillsync_store::LocalStore;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Counters for one pull phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullStats {
    /// Local rows created from remote entities.
    pub created: u64,
    /// Local rows overwritten by newer remote versions.
    pub updated: u64,
    /// Local rows already current.
    pub unchanged: u64,
    /// Local rows removed because the service no longer has them.
    pub removed: u64,
    /// Note pages requested.
    pub pages: u64,
    /// Notes fetched in full.
    pub notes_fetched: u64,
    /// Resource bodies downloaded.
    pub resources_fetched: u64,
}

/// Runs the whole pull phase.
pub fn pull_all<R, S>(ctx: &SyncContext<'_, R, S>) -> SyncResult<PullStats>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let mut stats = PullStats::default();
    pull_notebooks(ctx, &mut stats)?;
    pull_tags(ctx, &mut stats)?;
    pull_notes(ctx, &mut stats)?;
    Ok(stats)
}

/// A local record that is reconciled against a full remote listing.
trait Listed: Record + Sized {
    type Remote;

    fn remote_guid(remote: &Self::Remote) -> Option<&Guid>;
    fn from_remote(remote: &Self::Remote) -> Self;
    fn is_stale(&self, remote: &Self::Remote) -> bool;
    fn apply_remote(&mut self, remote: &Self::Remote);
}

impl Listed for Notebook {
    type Remote = RemoteNotebook;

    fn remote_guid(remote: &RemoteNotebook) -> Option<&Guid> {
        remote.guid.as_ref()
    }

    fn from_remote(remote: &RemoteNotebook) -> Self {
        Notebook::from_remote(remote)
    }

    fn is_stale(&self, remote: &RemoteNotebook) -> bool {
        Notebook::is_stale(self, remote)
    }

    fn apply_remote(&mut self, remote: &RemoteNotebook) {
        Notebook::apply_remote(self, remote);
    }
}

impl Listed for Tag {
    type Remote = RemoteTag;

    fn remote_guid(remote: &RemoteTag) -> Option<&Guid> {
        remote.guid.as_ref()
    }

    fn from_remote(remote: &RemoteTag) -> Self {
        Tag::from_remote(remote)
    }

    fn is_stale(&self, remote: &RemoteTag) -> bool {
        Tag::is_stale(self, remote)
    }

    fn apply_remote(&mut self, remote: &RemoteTag) {
        Tag::apply_remote(self, remote);
    }
}

/// Pulls the notebook listing.
pub fn pull_notebooks<R, S>(ctx: &SyncContext<'_, R, S>, stats: &mut PullStats) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let listing = ctx.remote.list_notebooks()?;
    reconcile_listing::<Notebook, S>(ctx.store, &listing, stats)
}

/// Pulls the tag listing.
pub fn pull_tags<R, S>(ctx: &SyncContext<'_, R, S>, stats: &mut PullStats) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let listing = ctx.remote.list_tags()?;
    reconcile_listing::<Tag, S>(ctx.store, &listing, stats)
}

fn reconcile_listing<L, S>(store: &S, listing: &[L::Remote], stats: &mut PullStats) -> SyncResult<()>
where
    L: Listed,
    S: LocalStore,
{
    let mut seen = HashSet::new();
    for remote in listing {
        let Some(guid) = L::remote_guid(remote) else {
            continue;
        };
        match store.find_by_guid::<L>(guid)? {
            Some(mut local) => {
                if local.is_stale(remote) {
                    local.apply_remote(remote);
                    store.update(&local)?;
                    stats.updated += 1;
                } else {
                    stats.unchanged += 1;
                }
                seen.insert(local.id());
            }
            None => {
                let local = store.insert(L::from_remote(remote))?;
                store.commit()?;
                debug!(kind = %L::KIND, guid = %guid, "pulled new entity");
                seen.insert(local.id());
                stats.created += 1;
            }
        }
    }
    stats.removed += collect_garbage::<L, S>(store, seen)? as u64;
    store.commit()?;
    Ok(())
}

/// Deletes rows of `R` not in `seen`, sparing unpushed local creations.
/// Does nothing when `seen` is empty.
fn collect_garbage<R, S>(store: &S, mut seen: HashSet<LocalId>) -> SyncResult<usize>
where
    R: Record,
    S: LocalStore,
{
    if seen.is_empty() {
        debug!(kind = %R::KIND, "empty remote listing, skipping removal");
        return Ok(0);
    }
    seen.extend(unpushed::<R>(store.pending::<R>()?));
    let removed = store.delete_except::<R>(&seen)?;
    if removed > 0 {
        debug!(kind = %R::KIND, removed, "removed entities gone remotely");
    }
    Ok(removed)
}

fn unpushed<R: Record>(records: Vec<R>) -> impl Iterator<Item = LocalId> {
    records
        .into_iter()
        .filter(|record| record.guid().is_none() && record.action().is_pending())
        .map(|record| record.id())
}

/// Iterates over note listing pages until the reported total is covered.
pub struct NotePages<'a, R: RemoteClient + ?Sized> {
    remote: &'a R,
    page_size: u32,
    offset: u32,
    done: bool,
}

impl<'a, R: RemoteClient + ?Sized> NotePages<'a, R> {
    /// Starts paging from offset zero.
    pub fn new(remote: &'a R, page_size: u32) -> Self {
        Self {
            remote,
            page_size: page_size.max(1),
            offset: 0,
            done: false,
        }
    }
}

impl<R: RemoteClient + ?Sized> Iterator for NotePages<'_, R> {
    type Item = RemoteResult<NoteList>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let page = match self
            .remote
            .find_notes(NoteOrder::UpdatedDesc, self.offset, self.page_size)
        {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        self.offset = page.next_offset();
        // An empty page would never advance the offset.
        self.done = page.notes.is_empty() || self.offset >= page.total_notes;
        Some(Ok(page))
    }
}

/// Pulls notes page by page, fetching only new or stale ones.
pub fn pull_notes<R, S>(ctx: &SyncContext<'_, R, S>, stats: &mut PullStats) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let mut seen = HashSet::new();
    for page in NotePages::new(ctx.remote, ctx.config.limits.notes_per_request) {
        let page = page?;
        stats.pages += 1;
        for summary in &page.notes {
            let Some(guid) = summary.guid.as_ref() else {
                continue;
            };
            let local = ctx.store.find_by_guid::<Note>(guid)?;
            match local {
                Some(local) if !local.is_stale(summary) => {
                    seen.insert(local.id);
                    stats.unchanged += 1;
                }
                local => {
                    let id = pull_note(ctx, guid, local, stats)?;
                    seen.insert(id);
                }
            }
        }
    }
    stats.removed += collect_garbage::<Note, S>(ctx.store, seen)? as u64;
    ctx.store.commit()?;
    Ok(())
}

/// Fetches one note in full and merges it, creating the row if needed.
fn pull_note<R, S>(
    ctx: &SyncContext<'_, R, S>,
    guid: &Guid,
    local: Option<Note>,
    stats: &mut PullStats,
) -> SyncResult<LocalId>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let remote = ctx.remote.get_note(guid, GetNoteOptions::full())?;
    stats.notes_fetched += 1;

    let notebook_id = match &remote.notebook_guid {
        Some(guid) => ctx.store.find_by_guid::<Notebook>(guid)?.map(|nb| nb.id),
        None => None,
    };
    let mut tag_ids = Vec::with_capacity(remote.tag_guids.len());
    for guid in &remote.tag_guids {
        if let Some(tag) = ctx.store.find_by_guid::<Tag>(guid)? {
            tag_ids.push(tag.id);
        }
    }

    let note = match local {
        Some(mut note) => {
            note.apply_remote(&remote, notebook_id, tag_ids);
            ctx.store.update(&note)?;
            stats.updated += 1;
            note
        }
        None => {
            let mut note = Note::default();
            note.apply_remote(&remote, notebook_id, tag_ids);
            let note = ctx.store.insert(note)?;
            ctx.store.commit()?;
            debug!(note = %note.id, guid = %guid, "pulled new note");
            stats.created += 1;
            note
        }
    };

    pull_resources(ctx, &note, &remote, stats)?;
    Ok(note.id)
}

/// Reconciles the attachments of a freshly fetched note.
fn pull_resources<R, S>(
    ctx: &SyncContext<'_, R, S>,
    note: &Note,
    remote: &RemoteNote,
    stats: &mut PullStats,
) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let mut seen = HashSet::new();
    for summary in &remote.resources {
        let Some(guid) = summary.guid.as_ref() else {
            continue;
        };
        let local = ctx.store.find_by_guid::<Resource>(guid)?;
        match local {
            Some(local) if !local.is_stale(summary) => {
                seen.insert(local.id);
            }
            local => {
                let full = ctx.remote.get_resource(guid)?;
                stats.resources_fetched += 1;
                let path = store_body(&ctx.config.resource_dir, guid, &full)?;
                let id = match local {
                    Some(mut resource) => {
                        resource.note_id = note.id;
                        resource.apply_remote(&full, path);
                        ctx.store.update(&resource)?;
                        resource.id
                    }
                    None => {
                        let mut resource = Resource {
                            note_id: note.id,
                            ..Resource::default()
                        };
                        resource.apply_remote(&full, path);
                        let resource = ctx.store.insert(resource)?;
                        ctx.store.commit()?;
                        resource.id
                    }
                };
                seen.insert(id);
            }
        }
    }

    if seen.is_empty() {
        return Ok(());
    }
    seen.extend(unpushed(ctx.store.resources_for_note(note.id)?));
    let removed = ctx.store.delete_note_resources_except(note.id, &seen)?;
    stats.removed += removed as u64;
    ctx.store.commit()?;
    Ok(())
}

/// Writes a downloaded body to `<dir>/<guid>/<file name>`. The guid must be
/// a single plain path component.
fn store_body(dir: &Path, guid: &Guid, resource: &RemoteResource) -> SyncResult<PathBuf> {
    let mut components = Path::new(guid.as_str()).components();
    let folder = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => dir.join(name),
        _ => {
            return Err(SyncError::resource_io(
                dir,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("resource guid {guid} is not a plain path component"),
                ),
            ))
        }
    };
    fs::create_dir_all(&folder).map_err(|err| SyncError::resource_io(&folder, err))?;
    let file_name = Path::new(&resource.file_name)
        .file_name()
        .map_or_else(|| PathBuf::from("resource"), PathBuf::from);
    let path = folder.join(file_name);
    let body = resource.body.as_deref().unwrap_or_default();
    fs::write(&path, body).map_err(|err| SyncError::resource_io(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillsync_remote::MemoryService;

    #[test]
    fn note_pages_cover_total() {
        let service = MemoryService::new();
        for i in 0..7 {
            service.seed_note(&format!("note {i}"), "", None, &[]);
        }
        let pages: Vec<NoteList> = NotePages::new(&service, 3)
            .collect::<RemoteResult<_>>()
            .unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.iter().map(|p| p.notes.len()).sum::<usize>(), 7);
        assert_eq!(pages[2].start_index, 6);
    }

    #[test]
    fn note_pages_stop_on_empty_listing() {
        let service = MemoryService::new();
        let pages: Vec<_> = NotePages::new(&service, 10).collect();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn note_pages_stop_after_error() {
        let service = MemoryService::new();
        service.set_offline(true);
        let mut pages = NotePages::new(&service, 10);
        assert!(pages.next().unwrap().is_err());
        assert!(pages.next().is_none());
    }

    #[test]
    fn store_body_keeps_only_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let resource =
            RemoteResource::upload(None, b"png".to_vec(), "image/png", "../../etc/shot.png");
        let path = store_body(dir.path(), &Guid::new("r1"), &resource).unwrap();
        assert_eq!(path, dir.path().join("r1").join("shot.png"));
        assert_eq!(fs::read(path).unwrap(), b"png");
    }

    #[test]
    fn store_body_rejects_guid_leaving_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resource = RemoteResource::upload(None, b"x".to_vec(), "text/plain", "x.txt");
        for guid in ["..", "../escape", "/tmp/abs", "a/b", ""] {
            let err = store_body(dir.path(), &Guid::new(guid), &resource).unwrap_err();
            assert!(matches!(err, SyncError::ResourceIo { .. }), "{guid}");
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
