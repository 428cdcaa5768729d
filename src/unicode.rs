//! Code-point helpers for dictionary keys.

/// Words longer than this (in code points) are rejected and never stored.
pub const MAX_WORD_LENGTH: usize = 48;

pub fn code_point_count(s: &str) -> usize {
    s.chars().count()
}

/// A storable dictionary key: non-empty and at most [`MAX_WORD_LENGTH`]
/// code points.
pub fn is_valid_word(s: &str) -> bool {
    !s.is_empty() && code_point_count(s) <= MAX_WORD_LENGTH
}

/// Fold a key for the case/punctuation-insensitive exact-match query.
///
/// Case is folded and the marks `'` and `-` are dropped entirely. Spaces are
/// significant: a key containing a literal space never folds to the same
/// string as a spaceless query.
pub fn fold_for_exact_match(s: &str) -> String {
    s.chars()
        .filter(|&c| c != '\'' && c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_point_count() {
        assert_eq!(code_point_count("abc"), 3);
        assert_eq!(code_point_count("日本語"), 3);
        assert_eq!(code_point_count(""), 0);
    }

    #[test]
    fn test_is_valid_word() {
        assert!(is_valid_word("a"));
        assert!(is_valid_word(&"a".repeat(MAX_WORD_LENGTH)));
        assert!(!is_valid_word(&"a".repeat(MAX_WORD_LENGTH + 1)));
        assert!(!is_valid_word(""));
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_for_exact_match("aBc"), "abc");
        assert_eq!(fold_for_exact_match("ABC"), "abc");
    }

    #[test]
    fn test_fold_strips_apostrophe_and_hyphen() {
        assert_eq!(fold_for_exact_match("ab'c"), "abc");
        assert_eq!(fold_for_exact_match("a-b-c"), "abc");
        assert_eq!(fold_for_exact_match("ab-'-'-'-c"), "abc");
    }

    #[test]
    fn test_fold_keeps_spaces() {
        assert_eq!(fold_for_exact_match("ab c"), "ab c");
        assert_ne!(fold_for_exact_match("ab c"), fold_for_exact_match("abc"));
    }
}
