//! # quillsync testkit
//!
//! Test utilities for quillsync.
//!
//! This crate provides:
//! - A sync fixture wiring an in-memory service, store and engine together
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quillsync_testkit::prelude::*;
//!
//! #[test]
//! fn pulls_seeded_notebook() {
//!     let fixture = SyncFixture::new();
//!     fixture.service.seed_notebook("Inbox");
//!     fixture.sync();
//!     assert_eq!(fixture.committed::<Notebook>().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use quillsync_model::*;
    pub use quillsync_remote::{MemoryService, Operation, RemoteClient, RemoteError};
    pub use quillsync_store::{LocalStore, MemoryStore};
    pub use quillsync_sync_engine::{SyncConfig, SyncEngine, SyncError, SyncInterval};
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
