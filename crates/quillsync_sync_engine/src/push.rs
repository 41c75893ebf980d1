//! Push phase: sends pending local changes to the service.
//!
//! Notebooks go first, then tags, then notes, so that the notebook and tag
//! guids a note refers to exist by the time the note is sent. Each batch
//! ends with one commit; a guid handed out by the service is committed as
//! soon as it is recorded so a failure later in the batch cannot orphan the
//! remote entity.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use quillsync_model::{
    enml, truncate_chars, Action, Guid, Note, Notebook, RemoteNote, RemoteNotebook,
    RemoteResource, RemoteTag, Resource, Tag,
};
use quillsync_remote::{RemoteClient, RemoteResult};
use quillsync_store::LocalStore;
use std::fs;
use tracing::{debug, warn};

/// Counters for one push phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    /// Entities created remotely.
    pub created: u64,
    /// Entities updated remotely.
    pub updated: u64,
    /// Entities deleted (remotely, or locally only when never pushed).
    pub deleted: u64,
    /// Notebook renames performed to resolve name conflicts.
    pub renamed: u64,
    /// Pending actions left in place by policy.
    pub skipped: u64,
    /// Attachment bodies uploaded.
    pub resources_uploaded: u64,
}

impl PushStats {
    /// Total remote writes that succeeded.
    pub fn total(&self) -> u64 {
        self.created + self.updated + self.deleted
    }
}

/// Runs the whole push phase.
pub fn push_all<R, S>(ctx: &SyncContext<'_, R, S>) -> SyncResult<PushStats>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let mut stats = PushStats::default();
    push_notebooks(ctx, &mut stats)?;
    push_tags(ctx, &mut stats)?;
    push_notes(ctx, &mut stats)?;
    Ok(stats)
}

/// Pushes pending notebooks.
pub fn push_notebooks<R, S>(ctx: &SyncContext<'_, R, S>, stats: &mut PushStats) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    for mut notebook in ctx.store.pending::<Notebook>()? {
        match (notebook.action, notebook.guid.clone()) {
            (Action::Delete, guid) => {
                if !ctx.config.notebook_deletes {
                    debug!(notebook = %notebook.id, "notebook delete disabled, leaving pending");
                    stats.skipped += 1;
                    continue;
                }
                if let Some(guid) = guid {
                    tolerate_missing(ctx.remote.expunge_notebook(&guid), &guid)?;
                }
                ctx.store.delete::<Notebook>(notebook.id)?;
                stats.deleted += 1;
                continue;
            }
            (Action::Change, Some(_)) => {
                let updated = update_notebook_renaming(ctx, &mut notebook, stats)?;
                notebook.service_updated = updated.service_updated;
                stats.updated += 1;
            }
            _ => {
                let created = ctx.remote.create_notebook(&outgoing_notebook(ctx, &notebook))?;
                notebook.guid = created.guid;
                notebook.service_updated = created.service_updated;
                notebook.action = Action::None;
                ctx.store.update(&notebook)?;
                ctx.store.commit()?;
                debug!(notebook = %notebook.id, "created remote notebook");
                stats.created += 1;
                continue;
            }
        }
        notebook.action = Action::None;
        ctx.store.update(&notebook)?;
    }
    ctx.store.commit()?;
    Ok(())
}

fn outgoing_notebook<R, S>(ctx: &SyncContext<'_, R, S>, notebook: &Notebook) -> RemoteNotebook
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    RemoteNotebook {
        guid: notebook.guid.clone(),
        name: truncate_chars(&notebook.name, ctx.config.limits.notebook_name_len),
        default_notebook: notebook.default,
        service_updated: notebook.service_updated,
    }
}

/// Updates a notebook, appending the conflict marker to its name each time
/// the service reports the name as taken.
fn update_notebook_renaming<R, S>(
    ctx: &SyncContext<'_, R, S>,
    notebook: &mut Notebook,
    stats: &mut PushStats,
) -> SyncResult<RemoteNotebook>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let base = notebook.name.clone();
    let mut renames = 0;
    loop {
        match ctx.remote.update_notebook(&outgoing_notebook(ctx, notebook)) {
            Ok(updated) => return Ok(updated),
            Err(err) if err.is_name_conflict() => {
                if renames >= ctx.config.rename_attempts {
                    return Err(SyncError::NameConflictUnresolved {
                        name: notebook.name.clone(),
                        attempts: renames,
                    });
                }
                renames += 1;
                notebook.name = marked_name(
                    &base,
                    ctx.config.conflict_marker,
                    renames as usize,
                    ctx.config.limits.notebook_name_len,
                );
                stats.renamed += 1;
                warn!(notebook = %notebook.id, name = %notebook.name, "notebook name taken, renaming");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Appends `count` markers to `base`, shortening it first so the result
/// stays within `limit` characters.
fn marked_name(base: &str, marker: char, count: usize, limit: usize) -> String {
    let mut name = truncate_chars(base, limit.saturating_sub(count));
    name.extend(std::iter::repeat(marker).take(count));
    name
}

/// Pushes pending tags. Only creation and renaming are propagated.
pub fn push_tags<R, S>(ctx: &SyncContext<'_, R, S>, stats: &mut PushStats) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    for mut tag in ctx.store.pending::<Tag>()? {
        let outgoing = RemoteTag {
            guid: tag.guid.clone(),
            name: truncate_chars(&tag.name, ctx.config.limits.tag_name_len),
        };
        match (tag.action, tag.guid.is_some()) {
            (Action::Delete, _) => {
                debug!(tag = %tag.id, "tag deletes are not propagated");
                stats.skipped += 1;
                continue;
            }
            (Action::Change, true) => {
                ctx.remote.update_tag(&outgoing)?;
                stats.updated += 1;
            }
            _ => {
                let created = ctx.remote.create_tag(&outgoing)?;
                tag.guid = created.guid;
                tag.action = Action::None;
                ctx.store.update(&tag)?;
                ctx.store.commit()?;
                debug!(tag = %tag.id, "created remote tag");
                stats.created += 1;
                continue;
            }
        }
        tag.action = Action::None;
        ctx.store.update(&tag)?;
    }
    ctx.store.commit()?;
    Ok(())
}

/// Pushes pending notes, with their attachments where policy allows.
pub fn push_notes<R, S>(ctx: &SyncContext<'_, R, S>, stats: &mut PushStats) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    for mut note in ctx.store.pending::<Note>()? {
        match (note.action, note.guid.clone()) {
            (Action::Delete, guid) => {
                if let Some(guid) = guid {
                    tolerate_missing(ctx.remote.delete_note(&guid), &guid)?;
                }
                ctx.store.delete::<Note>(note.id)?;
                stats.deleted += 1;
            }
            (Action::Change, Some(_)) => {
                let mut outgoing = outgoing_note(ctx, &note)?;
                let uploads = attach_resources(ctx, &note, &mut outgoing)?;
                let updated = ctx.remote.update_note(&outgoing)?;
                stats.resources_uploaded += uploads.len() as u64;
                bind_resources(ctx, &note, Some(uploads), &updated)?;
                note.updated = updated.updated;
                note.action = Action::None;
                ctx.store.update(&note)?;
                stats.updated += 1;
            }
            _ => {
                let mut outgoing = outgoing_note(ctx, &note)?;
                let uploads = if ctx.config.attach_resources_on_create {
                    Some(attach_resources(ctx, &note, &mut outgoing)?)
                } else {
                    None
                };
                let created = ctx.remote.create_note(&outgoing)?;
                stats.resources_uploaded += uploads.as_ref().map_or(0, |u| u.len() as u64);
                note.guid = created.guid.clone();
                note.created = created.created;
                note.updated = created.updated;
                note.action = Action::None;
                ctx.store.update(&note)?;
                bind_resources(ctx, &note, uploads, &created)?;
                ctx.store.commit()?;
                debug!(note = %note.id, "created remote note");
                stats.created += 1;
            }
        }
    }
    ctx.store.commit()?;
    Ok(())
}

/// Treats a delete of something the service no longer has as done.
fn tolerate_missing(result: RemoteResult<()>, guid: &Guid) -> SyncResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => {
            warn!(guid = %guid, "already gone remotely");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Builds the remote form of a note: truncated title, wrapped content and
/// notebook and tag references resolved to guids. References whose target
/// has never been pushed are left out.
fn outgoing_note<R, S>(ctx: &SyncContext<'_, R, S>, note: &Note) -> SyncResult<RemoteNote>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let limits = &ctx.config.limits;
    let notebook_guid = match note.notebook_id {
        Some(id) => ctx.store.get::<Notebook>(id)?.and_then(|notebook| notebook.guid),
        None => None,
    };
    let mut tag_guids = Vec::with_capacity(note.tag_ids.len());
    for id in &note.tag_ids {
        if let Some(guid) = ctx.store.get::<Tag>(*id)?.and_then(|tag| tag.guid) {
            tag_guids.push(guid);
        }
    }
    Ok(RemoteNote {
        guid: note.guid.clone(),
        title: truncate_chars(&note.title, limits.note_title_len),
        content: enml::wrap(&note.content, limits.note_content_len),
        created: note.created,
        updated: note.updated,
        notebook_guid,
        tag_guids,
        resources: Vec::new(),
    })
}

/// Reads the note's live attachments off disk into `outgoing`. Returns the
/// local rows in upload order.
fn attach_resources<R, S>(
    ctx: &SyncContext<'_, R, S>,
    note: &Note,
    outgoing: &mut RemoteNote,
) -> SyncResult<Vec<Resource>>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let mut uploads = Vec::new();
    for resource in ctx.store.resources_for_note(note.id)? {
        if resource.action == Action::Delete {
            continue;
        }
        let body = fs::read(&resource.file_path)
            .map_err(|err| SyncError::resource_io(&resource.file_path, err))?;
        outgoing.resources.push(RemoteResource::upload(
            note.guid.clone(),
            body,
            resource.mime.clone(),
            resource.file_name.clone(),
        ));
        uploads.push(resource);
    }
    Ok(uploads)
}

/// Records the guids and hashes the service assigned to uploaded
/// attachments and drops rows marked for deletion, which the upload left
/// out. `uploads` is `None` when no attachments were sent at all.
fn bind_resources<R, S>(
    ctx: &SyncContext<'_, R, S>,
    note: &Note,
    uploads: Option<Vec<Resource>>,
    returned: &RemoteNote,
) -> SyncResult<()>
where
    R: RemoteClient + ?Sized,
    S: LocalStore,
{
    let Some(uploads) = uploads else {
        return Ok(());
    };
    for (mut resource, remote) in uploads.into_iter().zip(&returned.resources) {
        resource.guid.clone_from(&remote.guid);
        resource.hash = remote.body_hash.to_base64();
        resource.action = Action::None;
        ctx.store.update(&resource)?;
    }
    for resource in ctx.store.resources_for_note(note.id)? {
        if resource.action == Action::Delete {
            ctx.store.delete::<Resource>(resource.id)?;
        }
    }
    Ok(())
}
