//! Derived text fields and identifier helpers.
//!
//! Journal entries carry a `word_count` and a `keywords` frequency map that
//! are recomputed from `content` on every content write. Both are computed
//! here so the primary and fallback stores persist identical values.
//!
//! # Keyword extraction
//!
//! 1. Split on whitespace.
//! 2. Trim leading/trailing punctuation from each token and lowercase it.
//! 3. Drop empty tokens and members of [`STOP_WORDS`].
//! 4. Count occurrences.
//!
//! ```rust
//! use readnest_core::text::{keyword_frequencies, word_count};
//!
//! assert_eq!(word_count("the cat sat on the mat"), 6);
//! let keywords = keyword_frequencies("the cat sat on the mat");
//! assert_eq!(keywords.len(), 3);
//! assert_eq!(keywords["cat"], 1);
//! ```

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::EntityKind;

/// Words excluded from keyword maps. Sorted for binary search.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does",
    "for", "from", "had", "has", "have", "he", "her", "here", "him", "his", "how", "i", "if",
    "in", "into", "is", "it", "its", "just", "me", "my", "no", "not", "of", "on", "or", "our",
    "out", "over", "she", "so", "some", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "to", "too", "up", "us", "was", "we", "were", "what",
    "when", "where", "which", "who", "will", "with", "would", "you", "your",
];

const MAX_ID_LEN: usize = 128;

/// Number of whitespace-delimited tokens.
pub fn word_count(content: &str) -> u32 {
    content.split_whitespace().count() as u32
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Case-insensitive token frequencies, excluding stop words.
pub fn keyword_frequencies(content: &str) -> BTreeMap<String, u32> {
    let mut frequencies = BTreeMap::new();
    for raw in content.split_whitespace() {
        let token = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if token.is_empty() || is_stop_word(&token) {
            continue;
        }
        *frequencies.entry(token).or_insert(0) += 1;
    }
    frequencies
}

/// Generates `<prefix>_<unix seconds>_<8 hex chars>`.
pub fn generate_id(kind: EntityKind, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", kind.id_prefix(), now.timestamp(), &suffix[..8])
}

/// Rejects ids that could not have been produced by [`generate_id`] or an
/// import: empty, overlong, or containing characters outside `[A-Za-z0-9_-]`.
pub fn validate_id(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::invalid("id", "must not be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(StoreError::invalid(
            "id",
            format!("longer than {MAX_ID_LEN} characters"),
        ));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(StoreError::invalid(
            "id",
            format!("unexpected character {bad:?}"),
        ));
    }
    Ok(())
}

/// Rejects blank required text fields.
pub fn require_text(field: &'static str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::invalid(field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_are_sorted() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS);
    }

    #[test]
    fn cat_sentence() {
        let content = "the cat sat on the mat";
        assert_eq!(word_count(content), 6);
        let keywords = keyword_frequencies(content);
        let expected: BTreeMap<String, u32> = [("cat", 1), ("sat", 1), ("mat", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(keywords, expected);
    }

    #[test]
    fn keywords_are_case_insensitive_and_strip_punctuation() {
        let keywords = keyword_frequencies("Rust, rust! RUST? The borrow-checker.");
        assert_eq!(keywords["rust"], 3);
        assert_eq!(keywords["borrow-checker"], 1);
        assert!(!keywords.contains_key("the"));
    }

    #[test]
    fn empty_content() {
        assert_eq!(word_count("   \n\t "), 0);
        assert!(keyword_frequencies("").is_empty());
    }

    #[test]
    fn generated_ids_validate() {
        let now = Utc::now();
        for kind in EntityKind::ALL {
            let id = generate_id(kind, now);
            assert!(id.starts_with(kind.id_prefix()));
            validate_id(&id).unwrap();
        }
    }

    #[test]
    fn generated_ids_differ() {
        let now = Utc::now();
        assert_ne!(
            generate_id(EntityKind::Journal, now),
            generate_id(EntityKind::Journal, now)
        );
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(validate_id("").is_err());
        assert!(validate_id("j_1/../etc").is_err());
        assert!(validate_id("j 1").is_err());
        assert!(validate_id(&"x".repeat(129)).is_err());
        validate_id("feed_1700000000_0a1b2c3d").unwrap();
    }
}
