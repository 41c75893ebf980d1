//! # quillsync remote
//!
//! Capability contract for the remote note service.
//!
//! This crate provides:
//! - The `RemoteClient` trait (list/get/create/update/delete per entity kind)
//! - The `RemoteError` taxonomy (validation, name conflict, not found,
//!   transient)
//! - `ServiceLimits`, the field lengths and page size the service enforces
//! - `MemoryService`, an in-memory service honouring the same contract,
//!   with fault injection and call accounting for tests
//!
//! Wire protocol and authentication live outside this crate; a networked
//! client implements `RemoteClient` on top of them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod limits;
mod memory;

pub use client::{GetNoteOptions, NoteOrder, RemoteClient};
pub use error::{RemoteError, RemoteResult};
pub use limits::ServiceLimits;
pub use memory::{MemoryService, Operation};
