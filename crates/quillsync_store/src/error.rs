//! Error types for the local store.

use quillsync_model::{EntityKind, LocalId};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Collection searched.
        kind: EntityKind,
        /// Missing local ID.
        id: LocalId,
    },

    /// Snapshot encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A row was stored under the wrong collection.
    #[error("corrupt store: {message}")]
    Corrupt {
        /// Description of the inconsistency.
        message: String,
    },
}
