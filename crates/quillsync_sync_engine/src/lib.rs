//! # quillsync sync engine
//!
//! Two-way reconciliation between a local note store and a remote note
//! service.
//!
//! This crate provides:
//! - Push phase (notebooks, tags, notes and their attachments)
//! - Pull phase with staleness checks, paging and removal of vanished rows
//! - Bounded notebook renaming on name conflicts
//! - A serialised sync engine with rollback on failure
//! - A background orchestrator with periodic, triggered and forced cycles
//!
//! ## Cycle
//!
//! Every cycle pushes first, then pulls:
//! 1. Pending local notebooks, tags and notes are sent to the service
//! 2. Remote notebooks and tags are listed and merged
//! 3. Remote notes are paged newest first; only new or stale ones are
//!    fetched, along with any attachment whose hash changed
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at a time
//! - The service wins every conflict it knows about
//! - Removal of vanished rows never runs on an empty listing
//! - A failed cycle leaves the store at its last commit

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod orchestrator;
mod pull;
mod push;
mod state;

pub use config::{SyncConfig, SyncInterval, DEFAULT_SYNC_INTERVAL, SYNC_MANUAL};
pub use context::SyncContext;
pub use error::{SyncError, SyncResult};
pub use orchestrator::SyncOrchestrator;
pub use pull::{pull_all, pull_notebooks, pull_notes, pull_tags, NotePages, PullStats};
pub use push::{push_all, push_notebooks, push_notes, push_tags, PushStats};
pub use state::{SyncCycleResult, SyncEngine, SyncState, SyncStats};
