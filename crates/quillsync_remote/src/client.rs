//! The remote client capability.

use crate::error::RemoteResult;
use quillsync_model::{Guid, NoteList, RemoteNote, RemoteNotebook, RemoteResource, RemoteTag};

/// Sort order for note listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteOrder {
    /// Most recently updated first.
    #[default]
    UpdatedDesc,
}

/// What a `get_note` call should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetNoteOptions {
    /// Include the ENML content.
    pub with_content: bool,
    /// Include resource metadata and hashes (bodies are fetched separately).
    pub with_resources: bool,
    /// Include note attributes.
    pub with_attributes: bool,
    /// Include shared-note information.
    pub with_shared_notes: bool,
}

impl GetNoteOptions {
    /// Everything in one round trip.
    pub const fn full() -> Self {
        Self {
            with_content: true,
            with_resources: true,
            with_attributes: true,
            with_shared_notes: true,
        }
    }
}

/// Operations the sync engine needs from the note service.
///
/// Calls are blocking from the caller's point of view. Implementations are
/// expected to enforce the service's field length and page size limits and
/// report violations as `RemoteError::Validation`.
pub trait RemoteClient: Send + Sync {
    /// Lists every notebook.
    fn list_notebooks(&self) -> RemoteResult<Vec<RemoteNotebook>>;

    /// Creates a notebook and returns it with its assigned guid.
    fn create_notebook(&self, notebook: &RemoteNotebook) -> RemoteResult<RemoteNotebook>;

    /// Updates a notebook identified by its guid.
    fn update_notebook(&self, notebook: &RemoteNotebook) -> RemoteResult<RemoteNotebook>;

    /// Permanently removes a notebook.
    fn expunge_notebook(&self, guid: &Guid) -> RemoteResult<()>;

    /// Lists every tag.
    fn list_tags(&self) -> RemoteResult<Vec<RemoteTag>>;

    /// Creates a tag and returns it with its assigned guid.
    fn create_tag(&self, tag: &RemoteTag) -> RemoteResult<RemoteTag>;

    /// Updates a tag identified by its guid.
    fn update_tag(&self, tag: &RemoteTag) -> RemoteResult<RemoteTag>;

    /// Returns one page of note metadata.
    fn find_notes(&self, order: NoteOrder, offset: u32, limit: u32) -> RemoteResult<NoteList>;

    /// Fetches a single note.
    fn get_note(&self, guid: &Guid, options: GetNoteOptions) -> RemoteResult<RemoteNote>;

    /// Creates a note and returns it with its assigned guid.
    fn create_note(&self, note: &RemoteNote) -> RemoteResult<RemoteNote>;

    /// Updates a note identified by its guid.
    fn update_note(&self, note: &RemoteNote) -> RemoteResult<RemoteNote>;

    /// Deletes a note.
    fn delete_note(&self, guid: &Guid) -> RemoteResult<()>;

    /// Fetches one resource including its body.
    fn get_resource(&self, guid: &Guid) -> RemoteResult<RemoteResource>;
}
