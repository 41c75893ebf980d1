//! Per-cycle context handed to the push and pull phases.

use crate::config::SyncConfig;
use quillsync_remote::RemoteClient;
use quillsync_store::LocalStore;

/// Everything one cycle works against.
///
/// Built by the engine at the start of each cycle and passed by reference
/// into every phase; phases hold no state of their own.
pub struct SyncContext<'a, R: RemoteClient + ?Sized, S: LocalStore> {
    /// The note service.
    pub remote: &'a R,
    /// The local datastore.
    pub store: &'a S,
    /// Engine configuration.
    pub config: &'a SyncConfig,
}

impl<'a, R: RemoteClient + ?Sized, S: LocalStore> SyncContext<'a, R, S> {
    /// Creates a context.
    pub fn new(remote: &'a R, store: &'a S, config: &'a SyncConfig) -> Self {
        Self {
            remote,
            store,
            config,
        }
    }
}
