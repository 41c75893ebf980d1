//! Core type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch, as reported by the note service.
pub type Timestamp = i64;

/// Local-only identifier of a record.
///
/// Stable for the lifetime of the local row and never sent to the service.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LocalId(pub u64);

impl LocalId {
    /// Creates a new local ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local:{}", self.0)
    }
}

/// Remote identifier assigned by the note service.
///
/// A record without a guid has not been created remotely yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Guid(pub String);

impl Guid {
    /// Creates a guid from any string-like value.
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into())
    }

    /// Returns the guid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Pending local mutation intent of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    /// In sync with the last known remote state.
    #[default]
    None,
    /// Created locally, not yet known to the service.
    Create,
    /// Edited locally since the last push.
    Change,
    /// Deleted locally, remote delete pending.
    Delete,
}

impl Action {
    /// Returns true if the push phase has work to do for this record.
    #[must_use]
    pub fn is_pending(self) -> bool {
        !matches!(self, Action::None)
    }
}

/// The four entity kinds the engine reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Notebook container.
    Notebook,
    /// Tag label.
    Tag,
    /// Note body.
    Note,
    /// Attachment owned by a note.
    Resource,
}

impl EntityKind {
    /// Returns the lowercase collection name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Notebook => "notebook",
            EntityKind::Tag => "tag",
            EntityKind::Note => "note",
            EntityKind::Resource => "resource",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncates `text` to at most `max` characters, then trims whitespace.
///
/// Truncation counts characters, never splitting a UTF-8 sequence.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    let end = text
        .char_indices()
        .nth(max)
        .map_or(text.len(), |(index, _)| index);
    text[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn action_pending() {
        assert!(!Action::None.is_pending());
        assert!(Action::Create.is_pending());
        assert!(Action::Change.is_pending());
        assert!(Action::Delete.is_pending());
        assert_eq!(Action::default(), Action::None);
    }

    #[test]
    fn id_display() {
        assert_eq!(LocalId::new(7).to_string(), "local:7");
        assert_eq!(Guid::new("abc").to_string(), "abc");
        assert_eq!(EntityKind::Resource.to_string(), "resource");
    }

    #[test]
    fn truncate_trims_after_cutting() {
        assert_eq!(truncate_chars("  hello world", 8), "hello");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("ééééé", 2), "éé");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }

    proptest! {
        #[test]
        fn truncate_never_exceeds_limit(text in "\\PC{0,64}", max in 0usize..40) {
            let truncated = truncate_chars(&text, max);
            prop_assert!(truncated.chars().count() <= max);
        }
    }
}
