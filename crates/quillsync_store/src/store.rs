//! The local store capability.

use crate::error::StoreResult;
use quillsync_model::{Guid, LocalId, Record, Resource};
use std::collections::HashSet;

/// Transactional access to the local entity collections.
///
/// All methods take `&self`; implementations synchronise internally so the
/// sync worker and editing collaborators can share one handle.
pub trait LocalStore: Send + Sync {
    /// Gets a record by local ID.
    fn get<R: Record>(&self, id: LocalId) -> StoreResult<Option<R>>;

    /// Finds a record by remote guid.
    fn find_by_guid<R: Record>(&self, guid: &Guid) -> StoreResult<Option<R>>;

    /// Returns every record of a collection, ordered by local ID.
    fn all<R: Record>(&self) -> StoreResult<Vec<R>>;

    /// Returns records with a pending action, ordered by local ID.
    fn pending<R: Record>(&self) -> StoreResult<Vec<R>> {
        Ok(self
            .all::<R>()?
            .into_iter()
            .filter(|record| record.action().is_pending())
            .collect())
    }

    /// Inserts a record, assigning and returning its local ID.
    fn insert<R: Record>(&self, record: R) -> StoreResult<R>;

    /// Replaces an existing record.
    fn update<R: Record>(&self, record: &R) -> StoreResult<()>;

    /// Deletes a record. Deleting a note also deletes its resources.
    ///
    /// Returns false if the record did not exist.
    fn delete<R: Record>(&self, id: LocalId) -> StoreResult<bool>;

    /// Deletes every record of a collection whose ID is not in `keep`.
    ///
    /// Returns the number of deleted rows (cascaded resources not counted).
    fn delete_except<R: Record>(&self, keep: &HashSet<LocalId>) -> StoreResult<usize>;

    /// Returns the resources owned by a note.
    fn resources_for_note(&self, note_id: LocalId) -> StoreResult<Vec<Resource>>;

    /// Deletes resources of `note_id` whose ID is not in `keep`.
    fn delete_note_resources_except(
        &self,
        note_id: LocalId,
        keep: &HashSet<LocalId>,
    ) -> StoreResult<usize>;

    /// Publishes the open transaction.
    fn commit(&self) -> StoreResult<()>;

    /// Discards every change since the last commit.
    fn rollback(&self) -> StoreResult<()>;
}
