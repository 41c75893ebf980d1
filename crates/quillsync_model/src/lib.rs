//! # quillsync model
//!
//! Entity model shared by the local store, the remote client and the sync
//! engine.
//!
//! This crate provides:
//! - Identifier newtypes (`LocalId`, `Guid`)
//! - The pending-action flag (`Action`) and its lifecycle
//! - Local records: `Notebook`, `Tag`, `Note`, `Resource`
//! - Remote representations exchanged with the note service
//! - Content hashing for resources
//! - ENML envelope handling and length truncation
//!
//! ## Action lifecycle
//!
//! Editing collaborators move a record from `Action::None` to one of
//! `Create`, `Change` or `Delete`. Only the push phase moves it back to
//! `Action::None` (or removes the row after a successful delete).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
pub mod enml;
mod hash;
mod remote;
mod types;

pub use entity::{AnyRecord, Notebook, Note, Record, Resource, Tag};
pub use hash::ContentHash;
pub use remote::{NoteList, RemoteNote, RemoteNotebook, RemoteResource, RemoteTag};
pub use types::{truncate_chars, Action, EntityKind, Guid, LocalId, Timestamp};
