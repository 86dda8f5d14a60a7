//! Code shape checks and display formatting.

use crate::config::SearchConfig;
use regex::Regex;
use std::sync::LazyLock;

static TOP_LEVEL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SearchConfig::TOP_LEVEL_CODE_PATTERN).unwrap());

/// A code as typed by a user, with the display separator: `A10.0`.
static DOTTED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][0-9]{2}\.[0-9A-Za-z]+$").unwrap());

/// Display form of a code.
///
/// - "A100" → "A10.0"
/// - "A10" → "A10"
pub fn format_code(code: &str) -> String {
    let stem_len = SearchConfig::CODE_STEM_LEN;
    match code.char_indices().nth(stem_len) {
        Some((split, _)) => format!(
            "{}{}{}",
            &code[..split],
            SearchConfig::CODE_SEPARATOR,
            &code[split..]
        ),
        None => code.to_string(),
    }
}

/// True for category-level codes: one letter followed by digits only.
pub fn is_top_level_code(code: &str) -> bool {
    TOP_LEVEL_CODE.is_match(code)
}

/// Strip the display separator from a code-shaped term.
///
/// Returns `None` when the term does not look like a dotted code.
pub fn canonical_code_term(term: &str) -> Option<String> {
    if DOTTED_CODE.is_match(term) {
        Some(term.replace(SearchConfig::CODE_SEPARATOR, ""))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_long_code() {
        assert_eq!(format_code("A100"), "A10.0");
        assert_eq!(format_code("S7211XA"), "S72.11XA");
    }

    #[test]
    fn test_format_short_code_unchanged() {
        assert_eq!(format_code("A10"), "A10");
        assert_eq!(format_code("B2"), "B2");
        assert_eq!(format_code(""), "");
    }

    #[test]
    fn test_top_level_shape() {
        assert!(is_top_level_code("A10"));
        assert!(is_top_level_code("Z9"));
        assert!(is_top_level_code("A100"));
        assert!(!is_top_level_code("A10X"));
        assert!(!is_top_level_code("A10.0"));
        assert!(!is_top_level_code("AB10"));
        assert!(!is_top_level_code("A"));
    }

    #[test]
    fn test_canonical_code_term() {
        assert_eq!(canonical_code_term("A10.0").as_deref(), Some("A100"));
        assert_eq!(canonical_code_term("s72.11xa").as_deref(), Some("s7211xa"));
        assert_eq!(canonical_code_term("A10"), None);
        assert_eq!(canonical_code_term("v1.5"), None);
    }
}
