//! Trigram string similarity.
//!
//! Follows the pg_trgm model: each alphanumeric word is lowercased and padded
//! with two leading spaces and one trailing space, every three-character
//! window is a trigram, and similarity is the Jaccard index of the two trigram
//! sets.

use std::collections::HashSet;

pub type Trigram = [char; 3];

/// Collect the distinct trigrams of `text`.
pub fn trigrams(text: &str) -> HashSet<Trigram> {
    let mut set = HashSet::new();

    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();

        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }

    set
}

/// Similarity in `[0, 1]`; 0 when either side has no words.
pub fn trigram_similarity(left: &str, right: &str) -> f64 {
    set_similarity(&trigrams(left), &trigrams(right))
}

/// Jaccard index of two precomputed trigram sets.
pub fn set_similarity(left: &HashSet<Trigram>, right: &HashSet<Trigram>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(right).count();
    let total = left.len() + right.len() - shared;
    shared as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigrams_of_word() {
        let set = trigrams("cat");
        assert_eq!(set.len(), 4);
        assert!(set.contains(&[' ', ' ', 'c']));
        assert!(set.contains(&[' ', 'c', 'a']));
        assert!(set.contains(&['c', 'a', 't']));
        assert!(set.contains(&['a', 't', ' ']));
    }

    #[test]
    fn test_identical_strings() {
        assert_eq!(trigram_similarity("Cholera", "cholera"), 1.0);
    }

    #[test]
    fn test_partial_overlap() {
        // "word" has 5 trigrams, "words" has 6, 4 shared
        let sim = trigram_similarity("word", "words");
        assert!((sim - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_similarity_matches_text_form() {
        let query = trigrams("iron anemia");
        for text in ["Iron deficiency anemia", "anemia", "Cholera"] {
            assert_eq!(
                set_similarity(&trigrams(text), &query),
                trigram_similarity(text, "iron anemia")
            );
        }
    }

    #[test]
    fn test_unrelated_and_empty() {
        assert_eq!(trigram_similarity("abc", "xyz"), 0.0);
        assert_eq!(trigram_similarity("", "typhoid"), 0.0);
        assert_eq!(trigram_similarity("...", "---"), 0.0);
    }

    #[test]
    fn test_word_order_does_not_matter() {
        let a = trigram_similarity("typhoid fever", "fever typhoid");
        assert_eq!(a, 1.0);
    }
}
