//! Keyword normalization and extraction for the memory keyword index.
//!
//! Keywords are cheap pre-filters, not search: they only need to be
//! normalized consistently so that the same concept always lands on the
//! same index entry.

use std::collections::BTreeSet;

/// Words too common to be useful as index keys.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "by", "for", "from", "had", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "were", "with",
];

/// Normalize a single token: lowercase, strip non-alphanumeric edges,
/// collapse inner whitespace.
///
/// Returns `None` for tokens that normalize to fewer than 2 characters.
#[must_use]
pub fn normalize(token: &str) -> Option<String> {
    let cleaned: String = token
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.chars().count() < 2 {
        None
    } else {
        Some(cleaned)
    }
}

/// Extract the keyword set for a memory node from its triple and
/// description.
///
/// Each non-empty triple field contributes its full normalized phrase;
/// individual words of the triple and description contribute too, minus
/// stopwords and short fragments.
#[must_use]
pub fn extract(subject: &str, predicate: &str, object: &str, description: &str) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();

    for phrase in [subject, predicate, object] {
        if let Some(normalized) = normalize(phrase) {
            keywords.insert(normalized);
        }
    }

    for source in [subject, predicate, object, description] {
        for word in source.split_whitespace() {
            let Some(normalized) = normalize(word) else {
                continue;
            };
            if normalized.chars().count() < 3 || STOPWORDS.contains(&normalized.as_str()) {
                continue;
            }
            keywords.insert(normalized);
        }
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_and_lowercases() {
        assert_eq!(normalize("  Hobbs   Cafe! "), Some("hobbs cafe".into()));
        assert_eq!(normalize("X"), None);
        assert_eq!(normalize("  . "), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("Drinking  Coffee").expect("some");
        assert_eq!(normalize(&once), Some(once.clone()));
    }

    #[test]
    fn extract_covers_triple_phrases_and_words() {
        let kws = extract("Klaus Mueller", "is reading", "research paper", "Klaus reads at the library");
        assert!(kws.contains("klaus mueller"));
        assert!(kws.contains("is reading"));
        assert!(kws.contains("research paper"));
        assert!(kws.contains("library"));
        // Stopwords never index.
        assert!(!kws.contains("the"));
        assert!(!kws.contains("at"));
    }

    #[test]
    fn extract_on_empty_triple_uses_description() {
        let kws = extract("", "", "", "a quiet thought about painting");
        assert!(kws.contains("painting"));
        assert!(kws.contains("quiet"));
        assert!(!kws.contains("about"));
    }
}
