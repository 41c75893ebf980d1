//! ENML envelope handling.
//!
//! The service only accepts note content wrapped in an `en-note` document.
//! Locally only the inner markup is kept.

const DOCTYPE: &str = r#"<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">"#;
const OPEN: &str = "<en-note>";
const CLOSE: &str = "</en-note>";

/// Characters the envelope adds around the inner content.
pub const ENVELOPE_LEN: usize = DOCTYPE.len() + 1 + OPEN.len() + CLOSE.len();

/// Wraps local content in the envelope.
///
/// The inner content is truncated first so the whole document stays within
/// `max_len` characters.
#[must_use]
pub fn wrap(content: &str, max_len: usize) -> String {
    let budget = max_len.saturating_sub(ENVELOPE_LEN);
    let end = content
        .char_indices()
        .nth(budget)
        .map_or(content.len(), |(index, _)| index);
    format!("{DOCTYPE}\n{OPEN}{}{CLOSE}", &content[..end])
        .trim()
        .to_string()
}

/// Extracts the inner markup of an envelope.
///
/// Content without an envelope is returned trimmed and otherwise unchanged.
/// Attributes on the opening tag (e.g. `<en-note style="...">`) are dropped.
#[must_use]
pub fn unwrap(document: &str) -> String {
    let Some(start) = document.find("<en-note") else {
        return document.trim().to_string();
    };
    let Some(open_end) = document[start..].find('>').map(|i| start + i + 1) else {
        return document.trim().to_string();
    };
    if document[start..open_end].ends_with("/>") {
        return String::new();
    }
    let inner_end = document.rfind(CLOSE).filter(|&end| end >= open_end);
    match inner_end {
        Some(end) => document[open_end..end].to_string(),
        None => document[open_end..].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_produces_envelope() {
        let doc = wrap("<div>hi</div>", 1000);
        assert!(doc.starts_with("<!DOCTYPE en-note"));
        assert!(doc.ends_with("<en-note><div>hi</div></en-note>"));
    }

    #[test]
    fn wrap_truncates_inner_content() {
        let doc = wrap("abcdef", ENVELOPE_LEN + 3);
        assert!(doc.ends_with("<en-note>abc</en-note>"));
        assert_eq!(doc.chars().count(), ENVELOPE_LEN + 3);
    }

    #[test]
    fn unwrap_inverts_wrap() {
        let inner = "<div>body <b>bold</b></div>";
        assert_eq!(unwrap(&wrap(inner, 1000)), inner);
    }

    #[test]
    fn unwrap_handles_attributes_and_empty_notes() {
        assert_eq!(unwrap(r#"<en-note style="x">text</en-note>"#), "text");
        assert_eq!(unwrap("<en-note/>"), "");
        assert_eq!(unwrap("  plain  "), "plain");
    }
}
