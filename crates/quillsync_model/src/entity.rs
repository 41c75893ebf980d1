//! Local records and the `Record` abstraction over them.

use crate::enml;
use crate::hash::ContentHash;
use crate::remote::{RemoteNote, RemoteNotebook, RemoteResource, RemoteTag};
use crate::types::{Action, EntityKind, Guid, LocalId, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Behaviour shared by every locally stored entity.
///
/// Stores are generic over this trait; each implementor names its
/// collection through `KIND` and round-trips through `AnyRecord`.
pub trait Record: Clone + Send + Sync + 'static {
    /// Collection this record lives in.
    const KIND: EntityKind;

    /// Local identifier. Zero until the store assigns one on insert.
    fn id(&self) -> LocalId;

    /// Sets the local identifier.
    fn set_id(&mut self, id: LocalId);

    /// Remote identifier, if the record exists remotely.
    fn guid(&self) -> Option<&Guid>;

    /// Pending action.
    fn action(&self) -> Action;

    /// Sets the pending action.
    fn set_action(&mut self, action: Action);

    /// Erases the concrete type.
    fn into_any(self) -> AnyRecord;

    /// Recovers the concrete type from an erased record.
    fn from_any(record: AnyRecord) -> Option<Self>;

    /// Borrows the concrete type from an erased record.
    fn from_any_ref(record: &AnyRecord) -> Option<&Self>;
}

/// Type-erased record, as held by stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnyRecord {
    /// A notebook.
    Notebook(Notebook),
    /// A tag.
    Tag(Tag),
    /// A note.
    Note(Note),
    /// A resource.
    Resource(Resource),
}

impl AnyRecord {
    /// Returns the kind of the wrapped record.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            AnyRecord::Notebook(_) => EntityKind::Notebook,
            AnyRecord::Tag(_) => EntityKind::Tag,
            AnyRecord::Note(_) => EntityKind::Note,
            AnyRecord::Resource(_) => EntityKind::Resource,
        }
    }
}

macro_rules! impl_record {
    ($ty:ident, $kind:ident) => {
        impl Record for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> LocalId {
                self.id
            }

            fn set_id(&mut self, id: LocalId) {
                self.id = id;
            }

            fn guid(&self) -> Option<&Guid> {
                self.guid.as_ref()
            }

            fn action(&self) -> Action {
                self.action
            }

            fn set_action(&mut self, action: Action) {
                self.action = action;
            }

            fn into_any(self) -> AnyRecord {
                AnyRecord::$kind(self)
            }

            fn from_any(record: AnyRecord) -> Option<Self> {
                match record {
                    AnyRecord::$kind(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_any_ref(record: &AnyRecord) -> Option<&Self> {
                match record {
                    AnyRecord::$kind(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_record!(Notebook, Notebook);
impl_record!(Tag, Tag);
impl_record!(Note, Note);
impl_record!(Resource, Resource);

/// A notebook row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notebook {
    /// Local identifier.
    pub id: LocalId,
    /// Remote identifier.
    pub guid: Option<Guid>,
    /// Display name.
    pub name: String,
    /// Default notebook flag.
    pub default: bool,
    /// Service modification time of the last merged remote version.
    pub service_updated: Timestamp,
    /// Pending action.
    pub action: Action,
}

impl Notebook {
    /// Creates a notebook the user just made locally.
    pub fn new_local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: Action::Create,
            ..Self::default()
        }
    }

    /// Creates a row for a notebook first seen in a remote listing.
    #[must_use]
    pub fn from_remote(remote: &RemoteNotebook) -> Self {
        let mut notebook = Self::default();
        notebook.apply_remote(remote);
        notebook
    }

    /// Returns true if `remote` supersedes this row.
    #[must_use]
    pub fn is_stale(&self, remote: &RemoteNotebook) -> bool {
        self.service_updated < remote.service_updated
    }

    /// Overwrites local fields from the remote version.
    pub fn apply_remote(&mut self, remote: &RemoteNotebook) {
        if remote.guid.is_some() {
            self.guid.clone_from(&remote.guid);
        }
        self.name.clone_from(&remote.name);
        self.default = remote.default_notebook;
        self.service_updated = remote.service_updated;
    }
}

/// A tag row. Tags carry no timestamp; staleness is name inequality.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tag {
    /// Local identifier.
    pub id: LocalId,
    /// Remote identifier.
    pub guid: Option<Guid>,
    /// Tag name.
    pub name: String,
    /// Pending action.
    pub action: Action,
}

impl Tag {
    /// Creates a tag the user just made locally.
    pub fn new_local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: Action::Create,
            ..Self::default()
        }
    }

    /// Creates a row for a tag first seen in a remote listing.
    #[must_use]
    pub fn from_remote(remote: &RemoteTag) -> Self {
        let mut tag = Self::default();
        tag.apply_remote(remote);
        tag
    }

    /// Returns true if `remote` supersedes this row.
    #[must_use]
    pub fn is_stale(&self, remote: &RemoteTag) -> bool {
        self.name != remote.name
    }

    /// Overwrites local fields from the remote version.
    pub fn apply_remote(&mut self, remote: &RemoteTag) {
        if remote.guid.is_some() {
            self.guid.clone_from(&remote.guid);
        }
        self.name.clone_from(&remote.name);
    }
}

/// A note row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Note {
    /// Local identifier.
    pub id: LocalId,
    /// Remote identifier.
    pub guid: Option<Guid>,
    /// Title.
    pub title: String,
    /// Inner content markup, without the ENML envelope.
    pub content: String,
    /// Creation time.
    pub created: Timestamp,
    /// Modification time of the last merged remote version.
    pub updated: Timestamp,
    /// Owning notebook, if filed.
    pub notebook_id: Option<LocalId>,
    /// Attached tags.
    pub tag_ids: Vec<LocalId>,
    /// Pending action.
    pub action: Action,
}

impl Note {
    /// Creates a note the user just made locally.
    pub fn new_local(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            action: Action::Create,
            ..Self::default()
        }
    }

    /// Returns true if `remote` supersedes this row.
    #[must_use]
    pub fn is_stale(&self, remote: &RemoteNote) -> bool {
        self.updated < remote.updated
    }

    /// Overwrites local fields from a fully fetched remote note.
    ///
    /// Notebook and tag references arrive as guids; the caller resolves them
    /// to local ids since only the store knows the mapping.
    pub fn apply_remote(
        &mut self,
        remote: &RemoteNote,
        notebook_id: Option<LocalId>,
        tag_ids: Vec<LocalId>,
    ) {
        if remote.guid.is_some() {
            self.guid.clone_from(&remote.guid);
        }
        self.title.clone_from(&remote.title);
        self.content = enml::unwrap(&remote.content);
        self.created = remote.created;
        self.updated = remote.updated;
        self.notebook_id = notebook_id;
        self.tag_ids = tag_ids;
    }
}

/// An attachment row, owned by a note.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resource {
    /// Local identifier.
    pub id: LocalId,
    /// Remote identifier.
    pub guid: Option<Guid>,
    /// Owning note.
    pub note_id: LocalId,
    /// Original file name.
    pub file_name: String,
    /// Where the body lives on disk.
    pub file_path: PathBuf,
    /// Declared MIME type.
    pub mime: String,
    /// Base64 of the body digest.
    pub hash: String,
    /// Pending action.
    pub action: Action,
}

impl Resource {
    /// Creates an attachment the user just added to a note.
    pub fn new_local(
        note_id: LocalId,
        file_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            note_id,
            file_name: file_name.into(),
            file_path: file_path.into(),
            mime: mime.into(),
            action: Action::Create,
            ..Self::default()
        }
    }

    /// Decodes the persisted hash.
    #[must_use]
    pub fn content_hash(&self) -> Option<ContentHash> {
        ContentHash::from_base64(&self.hash)
    }

    /// Returns true if the local body differs from (or is unknown relative
    /// to) the remote one.
    #[must_use]
    pub fn is_stale(&self, remote: &RemoteResource) -> bool {
        self.content_hash().as_ref() != Some(&remote.body_hash)
    }

    /// Overwrites local fields from the remote version, recording where its
    /// body was written.
    pub fn apply_remote(&mut self, remote: &RemoteResource, file_path: PathBuf) {
        if remote.guid.is_some() {
            self.guid.clone_from(&remote.guid);
        }
        self.mime.clone_from(&remote.mime);
        self.file_name.clone_from(&remote.file_name);
        self.hash = remote.body_hash.to_base64();
        self.file_path = file_path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_notebook(name: &str, updated: Timestamp) -> RemoteNotebook {
        RemoteNotebook {
            guid: Some(Guid::new("nb-1")),
            name: name.to_string(),
            default_notebook: false,
            service_updated: updated,
        }
    }

    #[test]
    fn local_records_start_as_create() {
        assert_eq!(Notebook::new_local("a").action, Action::Create);
        assert_eq!(Tag::new_local("a").action, Action::Create);
        assert_eq!(Note::new_local("t", "c").action, Action::Create);
        assert!(Notebook::new_local("a").guid.is_none());
    }

    #[test]
    fn remote_records_start_clean() {
        let notebook = Notebook::from_remote(&remote_notebook("Inbox", 10));
        assert_eq!(notebook.action, Action::None);
        assert_eq!(notebook.guid, Some(Guid::new("nb-1")));
        assert_eq!(notebook.service_updated, 10);
    }

    #[test]
    fn notebook_staleness_uses_timestamp() {
        let notebook = Notebook::from_remote(&remote_notebook("Inbox", 10));
        assert!(!notebook.is_stale(&remote_notebook("Renamed", 10)));
        assert!(notebook.is_stale(&remote_notebook("Inbox", 11)));
    }

    #[test]
    fn tag_staleness_uses_name() {
        let tag = Tag::from_remote(&RemoteTag {
            guid: Some(Guid::new("t1")),
            name: "work".into(),
        });
        assert!(!tag.is_stale(&RemoteTag {
            guid: Some(Guid::new("t1")),
            name: "work".into(),
        }));
        assert!(tag.is_stale(&RemoteTag {
            guid: Some(Guid::new("t1")),
            name: "Work".into(),
        }));
    }

    #[test]
    fn note_merge_strips_envelope() {
        let remote = RemoteNote {
            guid: Some(Guid::new("n1")),
            title: "Title".into(),
            content: enml::wrap("<p>body</p>", 1000),
            created: 1,
            updated: 2,
            ..RemoteNote::default()
        };
        let mut note = Note::default();
        note.apply_remote(&remote, Some(LocalId::new(3)), vec![LocalId::new(4)]);
        assert_eq!(note.content, "<p>body</p>");
        assert_eq!(note.notebook_id, Some(LocalId::new(3)));
        assert_eq!(note.tag_ids, vec![LocalId::new(4)]);
        assert_eq!(note.updated, 2);
    }

    #[test]
    fn resource_staleness_uses_decoded_hash() {
        let remote = RemoteResource::upload(None, b"data".to_vec(), "text/plain", "a.txt");
        let mut resource = Resource::default();
        assert!(resource.is_stale(&remote));

        resource.apply_remote(&remote, PathBuf::from("/tmp/a.txt"));
        assert!(!resource.is_stale(&remote));
        assert_eq!(resource.content_hash(), Some(ContentHash::of(b"data")));
    }

    #[test]
    fn any_record_round_trip() {
        let tag = Tag::new_local("x");
        let any = tag.clone().into_any();
        assert_eq!(any.kind(), EntityKind::Tag);
        assert_eq!(Tag::from_any_ref(&any), Some(&tag));
        assert!(Note::from_any(any).is_none());
    }
}
