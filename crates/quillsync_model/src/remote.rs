//! Remote representations exchanged with the note service.

use crate::hash::ContentHash;
use crate::types::{Guid, Timestamp};
use serde::{Deserialize, Serialize};

/// A notebook as the service sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNotebook {
    /// Absent when the notebook is being created.
    pub guid: Option<Guid>,
    /// Display name, unique per account.
    pub name: String,
    /// Whether new notes land here by default.
    pub default_notebook: bool,
    /// Last modification time on the service.
    pub service_updated: Timestamp,
}

/// A tag as the service sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    /// Absent when the tag is being created.
    pub guid: Option<Guid>,
    /// Tag name.
    pub name: String,
}

/// A note as the service sees it.
///
/// Listings return metadata only: `content` is empty and `resources` holds
/// no bodies. A full fetch fills in content and resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteNote {
    /// Absent when the note is being created.
    pub guid: Option<Guid>,
    /// Note title.
    pub title: String,
    /// Content wrapped in the ENML envelope.
    pub content: String,
    /// Creation time.
    pub created: Timestamp,
    /// Last modification time.
    pub updated: Timestamp,
    /// Owning notebook, if filed.
    pub notebook_guid: Option<Guid>,
    /// Tags attached to the note.
    pub tag_guids: Vec<Guid>,
    /// Attachments.
    pub resources: Vec<RemoteResource>,
}

/// An attachment as the service sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Absent when the resource is being uploaded.
    pub guid: Option<Guid>,
    /// Owning note.
    pub note_guid: Option<Guid>,
    /// Declared MIME type.
    pub mime: String,
    /// Original file name.
    pub file_name: String,
    /// Digest of the body.
    pub body_hash: ContentHash,
    /// Body bytes, present only when explicitly fetched or uploaded.
    pub body: Option<Vec<u8>>,
}

impl RemoteResource {
    /// Builds an upload from a body read off disk.
    pub fn upload(
        note_guid: Option<Guid>,
        body: Vec<u8>,
        mime: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            guid: None,
            note_guid,
            mime: mime.into(),
            file_name: file_name.into(),
            body_hash: ContentHash::of(&body),
            body: Some(body),
        }
    }
}

/// One page of a `find_notes` listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteList {
    /// Note metadata for this page.
    pub notes: Vec<RemoteNote>,
    /// Offset of the first note in this page.
    pub start_index: u32,
    /// Total number of notes matching the query.
    pub total_notes: u32,
}

impl NoteList {
    /// Offset of the note following this page.
    #[must_use]
    pub fn next_offset(&self) -> u32 {
        let len = u32::try_from(self.notes.len()).unwrap_or(u32::MAX);
        self.start_index.saturating_add(len)
    }

    /// Returns true if notes remain past this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.total_notes > self.next_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_hashes_body() {
        let upload = RemoteResource::upload(None, b"png".to_vec(), "image/png", "a.png");
        assert_eq!(upload.body_hash, ContentHash::of(b"png"));
        assert!(upload.guid.is_none());
    }

    #[test]
    fn note_list_paging() {
        let page = NoteList {
            notes: vec![RemoteNote::default(), RemoteNote::default()],
            start_index: 4,
            total_notes: 7,
        };
        assert_eq!(page.next_offset(), 6);
        assert!(page.has_more());

        let last = NoteList {
            notes: vec![RemoteNote::default()],
            start_index: 6,
            total_notes: 7,
        };
        assert!(!last.has_more());
    }
}
