//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for notebook and tag names the service accepts.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}")
        .expect("Invalid regex")
        .prop_map(|name| name.trim_end().to_string())
}

/// Strategy for a set of names unique under case-insensitive comparison.
pub fn unique_names_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(
        prop::string::string_regex("[a-z][a-z0-9]{0,15}").expect("Invalid regex"),
        0..=max,
    )
    .prop_map(|names| names.into_iter().collect())
}

/// Strategy for inner note markup.
pub fn note_content_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[a-zA-Z0-9 .,]{0,40}").expect("Invalid regex"),
        0..4,
    )
    .prop_map(|paragraphs| {
        paragraphs
            .iter()
            .map(|text| format!("<div>{text}</div>"))
            .collect::<String>()
    })
}

/// Strategy for attachment bodies.
pub fn resource_body_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..256)
}

/// Strategy for `(total notes, page size)` pairs.
pub fn paging_strategy() -> impl Strategy<Value = (usize, u32)> {
    (0usize..60, 1u32..20)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn names_are_non_empty(name in name_strategy()) {
            prop_assert!(!name.is_empty());
            prop_assert_eq!(name.trim(), name.as_str());
        }

        #[test]
        fn unique_names_differ_ignoring_case(names in unique_names_strategy(8)) {
            for (i, a) in names.iter().enumerate() {
                for b in &names[i + 1..] {
                    prop_assert!(!a.eq_ignore_ascii_case(b));
                }
            }
        }
    }
}
