//! Free-text field sanitization
//!
//! Address and employer values arrive from government spreadsheets with
//! stray whitespace, line breaks and occasionally a value pasted twice.
//! Cleaning is one pass: collapse whitespace (which also trims), cap the
//! length, then drop an exact whole-string duplication.

/// Placeholder stored when a field is empty after sanitization
pub const PLACEHOLDER: &str = "Unknown";

/// Maximum stored field length, in characters
pub const MAX_FIELD_CHARS: usize = 200;

/// Sanitize a free-text field for storage
///
/// # Examples
///
/// ```
/// use lmia_common::text::sanitize_field;
///
/// assert_eq!(sanitize_field("  215 Water  St,\n St. John's "), "215 Water St, St. John's");
/// assert_eq!(sanitize_field("Acme IncAcme Inc"), "Acme Inc");
/// assert_eq!(sanitize_field("Walla Walla"), "Walla Walla");
/// assert_eq!(sanitize_field("   "), "Unknown");
/// ```
pub fn sanitize_field(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_FIELD_CHARS).collect();

    let trimmed = capped.trim_end();
    let value = duplicated_half(trimmed).unwrap_or(trimmed);

    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

/// Minimum length of a half that counts as a pasted duplicate
///
/// Short values such as "AA" or "88" are legitimate.
const MIN_DUPLICATE_CHARS: usize = 4;

/// Returns the first half if `s` is exactly `h + h`
fn duplicated_half(s: &str) -> Option<&str> {
    let len = s.len();
    if len % 2 != 0 {
        return None;
    }

    let mid = len / 2;
    if !s.is_char_boundary(mid) || s[..mid].chars().count() < MIN_DUPLICATE_CHARS {
        return None;
    }

    (s[..mid] == s[mid..]).then(|| &s[..mid])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_collapses_and_trims() {
        assert_eq!(sanitize_field("\tPO Box219,   Lunenburg \r\n NS "), "PO Box219, Lunenburg NS");
    }

    #[test]
    fn test_empty_becomes_placeholder() {
        assert_eq!(sanitize_field(""), PLACEHOLDER);
        assert_eq!(sanitize_field(" \n\t "), PLACEHOLDER);
    }

    #[test]
    fn test_exact_duplication_removed() {
        assert_eq!(sanitize_field("Cilantro IncCilantro Inc"), "Cilantro Inc");
    }

    #[test]
    fn test_repeated_words_are_kept() {
        assert_eq!(sanitize_field("Walla Walla"), "Walla Walla");
        assert_eq!(sanitize_field("Baden Baden"), "Baden Baden");
        assert_eq!(sanitize_field("Mahi Mahi"), "Mahi Mahi");
        assert_eq!(sanitize_field("Cilantro Inc Cilantro Inc"), "Cilantro Inc Cilantro Inc");
    }

    #[test]
    fn test_short_values_are_kept() {
        assert_eq!(sanitize_field("AA"), "AA");
        assert_eq!(sanitize_field("88"), "88");
        assert_eq!(sanitize_field("ABAB"), "ABAB");
    }

    #[test]
    fn test_single_halving_only() {
        assert_eq!(sanitize_field("AcmeAcmeAcmeAcme"), "AcmeAcme");
    }

    #[test]
    fn test_repeated_suffix_is_not_touched() {
        // Only whole-string duplication is collapsed
        assert_eq!(sanitize_field("Main St Main St West"), "Main St Main St West");
        assert_eq!(sanitize_field("Walla Walla Foods"), "Walla Walla Foods");
    }

    #[test]
    fn test_length_cap() {
        let long = "x".repeat(150) + " " + &"y".repeat(150);
        let cleaned = sanitize_field(&long);
        assert_eq!(cleaned.chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(sanitize_field("Café Élan  Montréal"), "Café Élan Montréal");
        assert_eq!(sanitize_field("CaféCafé"), "Café");
    }

    proptest! {
        #[test]
        fn prop_pasted_twice_stored_once(value in "[a-z]{4,12} [A-Z][a-z]{2,12}") {
            let doubled = format!("{}{}", value, value);
            prop_assert_eq!(sanitize_field(&doubled), value);
        }

        #[test]
        fn prop_no_edge_or_double_whitespace(input in "\\PC{0,120}") {
            let cleaned = sanitize_field(&input);
            prop_assert!(!cleaned.is_empty());
            prop_assert_eq!(cleaned.trim(), cleaned.as_str());
            prop_assert!(!cleaned.contains("  "));
            prop_assert!(cleaned.chars().count() <= MAX_FIELD_CHARS);
        }

        #[test]
        fn prop_idempotent(input in "[a-zA-Z0-9 ,.]{0,250}") {
            let once = sanitize_field(&input);
            prop_assert_eq!(sanitize_field(&once), once.clone());
        }
    }
}
