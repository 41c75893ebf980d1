//! # quillsync store
//!
//! Local datastore capability consumed by the sync engine.
//!
//! This crate provides:
//! - The `LocalStore` trait: transactional CRUD over the four collections
//! - Delete-by-predicate for garbage collection
//! - `MemoryStore`, an in-memory implementation with optional CBOR
//!   snapshots persisted on every commit
//!
//! ## Transactions
//!
//! A store always has one open transaction. Reads observe it, `commit()`
//! publishes it and `rollback()` discards everything since the last commit.
//! The sync engine commits once per sub-step, so a failure only loses the
//! sub-step in progress.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::LocalStore;
