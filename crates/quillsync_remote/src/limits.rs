//! Service-imposed limits.

/// Maximum field lengths (in characters) and page size enforced by the
/// service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    /// Maximum notebook name length.
    pub notebook_name_len: usize,
    /// Maximum tag name length.
    pub tag_name_len: usize,
    /// Maximum note title length.
    pub note_title_len: usize,
    /// Maximum note content length, envelope included.
    pub note_content_len: usize,
    /// Maximum notes returned by one `find_notes` call.
    pub notes_per_request: u32,
}

impl ServiceLimits {
    /// Sets the page size.
    pub fn with_notes_per_request(mut self, notes: u32) -> Self {
        self.notes_per_request = notes.max(1);
        self
    }

    /// Sets the notebook name limit.
    pub fn with_notebook_name_len(mut self, len: usize) -> Self {
        self.notebook_name_len = len;
        self
    }

    /// Sets the note title limit.
    pub fn with_note_title_len(mut self, len: usize) -> Self {
        self.note_title_len = len;
        self
    }
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            notebook_name_len: 100,
            tag_name_len: 100,
            note_title_len: 255,
            note_content_len: 5 * 1024 * 1024,
            notes_per_request: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_at_least_one() {
        let limits = ServiceLimits::default().with_notes_per_request(0);
        assert_eq!(limits.notes_per_request, 1);
    }
}
