//! Internal helpers for text normalization.
//!
//! These utilities are **not** part of the public API. They centralize how
//! tag and counterparty names are reduced to lookup keys so that "Café",
//! "cafe " and "CAFE" resolve to the same entity.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Reduces a display name to its normalized lookup key.
///
/// NFD-decomposes, strips combining marks, lowercases and collapses
/// whitespace runs to a single space.
pub(crate) fn normalize_name(value: &str) -> String {
    let stripped: String = value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims optional free text, mapping empty results to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_folds_case_accents_and_spaces() {
        assert_eq!(normalize_name("  Café   Crème "), "cafe creme");
        assert_eq!(normalize_name("GROCERIES"), "groceries");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn optional_text_drops_blank_strings() {
        assert_eq!(normalize_optional_text(Some("  note ")), Some("note".to_string()));
        assert_eq!(normalize_optional_text(Some("   ")), None);
        assert_eq!(normalize_optional_text(None), None);
    }
}
