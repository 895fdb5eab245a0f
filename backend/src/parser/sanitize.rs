//! Column name sanitization.
//!
//! Turns arbitrary header text into unique, identifier-safe column ids,
//! parallel to the input:
//!
//! 1. trim; blank names become `Column_<position>` (1-based)
//! 2. whitespace runs become `_`, other non-word characters are dropped,
//!    leading/trailing underscores are stripped
//! 3. repeats get `_2`, `_3`, ... in order of appearance

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::models::Column;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid regex"));

fn placeholder(position: usize) -> String {
    format!("Column_{position}")
}

/// Display label for a raw header: trimmed text, or the positional placeholder.
fn label_for(raw: &str, position: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        placeholder(position)
    } else {
        trimmed.to_string()
    }
}

/// Rule 2 applied to a label; falls back to the placeholder if nothing survives.
fn identifier_for(label: &str, position: usize) -> String {
    let underscored = WHITESPACE_RUN.replace_all(label, "_");
    let cleaned = NON_WORD.replace_all(&underscored, "");
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        placeholder(position)
    } else {
        trimmed.to_string()
    }
}

/// Sanitize raw header names into unique column ids.
///
/// Output has the same length as the input, every id matches
/// `^[A-Za-z0-9_]+$`, and no two ids are equal.
pub fn sanitize_column_names<S: AsRef<str>>(raw_names: &[S]) -> Vec<String> {
    sanitize_columns(raw_names).into_iter().map(|c| c.id).collect()
}

/// Like [`sanitize_column_names`], keeping the display label of each column.
pub fn sanitize_columns<S: AsRef<str>>(raw_names: &[S]) -> Vec<Column> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    raw_names
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let position = idx + 1;
            let label = label_for(raw.as_ref(), position);
            let candidate = identifier_for(&label, position);

            let count = counts.entry(candidate.clone()).or_insert(0);
            *count += 1;
            let mut id = if *count == 1 {
                candidate.clone()
            } else {
                format!("{candidate}_{count}")
            };
            // A generated suffix can collide with a literal name seen earlier.
            while taken.contains(&id) {
                *count += 1;
                id = format!("{candidate}_{count}");
            }
            taken.insert(id.clone());

            Column { id, label }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::is_identifier_safe;
    use proptest::prelude::*;

    #[test]
    fn test_blank_names_get_positional_placeholders() {
        assert_eq!(
            sanitize_column_names(&["", "Name", ""]),
            vec!["Column_1", "Name", "Column_3"]
        );
    }

    #[test]
    fn test_duplicates_are_suffixed() {
        assert_eq!(sanitize_column_names(&["Name", "Name"]), vec!["Name", "Name_2"]);
        assert_eq!(
            sanitize_column_names(&["a", "a", "a"]),
            vec!["a", "a_2", "a_3"]
        );
    }

    #[test]
    fn test_whitespace_and_punctuation() {
        assert_eq!(
            sanitize_column_names(&["  First   Name ", "E-mail (work)", "_id_", "Price $"]),
            vec!["First_Name", "Email_work", "id", "Price"]
        );
    }

    #[test]
    fn test_names_with_nothing_left_use_placeholder() {
        assert_eq!(sanitize_column_names(&["Id", "???", "__"]), vec!["Id", "Column_2", "Column_3"]);
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(sanitize_column_names(&["Société", "名前"]), vec!["Socit", "Column_2"]);
    }

    #[test]
    fn test_generated_suffix_never_collides() {
        let ids = sanitize_column_names(&["Name_2", "Name", "Name"]);
        assert_eq!(ids, vec!["Name_2", "Name", "Name_3"]);

        let ids = sanitize_column_names(&["Name", "Name", "Name_2"]);
        assert_eq!(ids, vec!["Name", "Name_2", "Name_2_2"]);
    }

    #[test]
    fn test_labels_keep_display_text() {
        let columns = sanitize_columns(&[" First Name ", ""]);
        assert_eq!(columns[0].label, "First Name");
        assert_eq!(columns[0].id, "First_Name");
        assert_eq!(columns[1].label, "Column_2");
    }

    proptest! {
        #[test]
        fn prop_output_is_safe_unique_and_parallel(names in prop::collection::vec(".{0,12}", 0..12)) {
            let ids = sanitize_column_names(&names);
            prop_assert_eq!(ids.len(), names.len());
            let unique: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());
            for id in &ids {
                prop_assert!(is_identifier_safe(id));
            }
        }

        #[test]
        fn prop_idempotent_on_sanitized_names(names in prop::collection::vec("[ a-zA-Z0-9_-]{0,8}", 0..10)) {
            let once = sanitize_column_names(&names);
            let twice = sanitize_column_names(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
