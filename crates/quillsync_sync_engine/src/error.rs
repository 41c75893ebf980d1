//! Error types for the sync engine.

use quillsync_remote::RemoteError;
use quillsync_store::StoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote service rejected or failed a call.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A resource body could not be read or written.
    #[error("resource file {}: {source}", path.display())]
    ResourceIo {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A notebook name still conflicted after every allowed rename.
    #[error("notebook name conflict unresolved after {attempts} renames: {name}")]
    NameConflictUnresolved {
        /// Last name tried.
        name: String,
        /// Renames performed.
        attempts: u32,
    },

    /// The background worker thread could not be started.
    #[error("failed to start sync worker: {0}")]
    WorkerSpawn(#[source] io::Error),
}

impl SyncError {
    /// Wraps an I/O error on a resource file.
    pub fn resource_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ResourceIo {
            path: path.into(),
            source,
        }
    }

    /// Returns true if retrying the cycle later may succeed without any
    /// local change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Remote(RemoteError::Transient { .. }) | SyncError::ResourceIo { .. }
        )
    }
}
