//! Error types for remote calls.

use quillsync_model::{EntityKind, Guid};
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors the note service can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// A field violates a service constraint (length, required value).
    #[error("validation failed on {field}: {message}")]
    Validation {
        /// Offending field.
        field: String,
        /// Description of the violation.
        message: String,
    },

    /// Another entity already uses this name.
    #[error("name already in use: {name}")]
    NameConflict {
        /// The conflicting name.
        name: String,
    },

    /// The entity does not exist remotely.
    #[error("{kind} not found: {guid}")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Guid that was looked up.
        guid: Guid,
    },

    /// Network or service failure.
    #[error("transient failure: {message}")]
    Transient {
        /// Error message.
        message: String,
    },
}

impl RemoteError {
    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Returns true if the entity was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// Returns true if the error is a duplicate-name rejection.
    pub fn is_name_conflict(&self) -> bool {
        matches!(self, RemoteError::NameConflict { .. })
    }
}
