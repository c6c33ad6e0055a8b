//! Deterministic keyword extraction (C2).
//!
//! The structural half of edge weight formation (`weight::jaccard`) depends
//! on two fragments agreeing on the same lemma for the same word — lowercase
//! plus stopword filtering plus a light deterministic lemmatizer, applied
//! consistently, matters more here than linguistic sophistication.
//!
//! Grounded on the reference prototype's spaCy-based extractor (lowercase,
//! alphabetic, length > 3, stopword-filtered, deduplicated); spaCy itself
//! has no Rust equivalent in this stack, so lemmatization is replaced with a
//! small suffix-stripping table behind a trait, matching the hand-rolled
//! stopword-array idiom used elsewhere for this kind of lightweight NLP.

use std::collections::BTreeSet;

/// Pluggable lemmatization strategy, so a real backend can replace the
/// built-in suffix stripper without touching callers.
pub trait Lemmatizer: Send + Sync {
    fn lemmatize(&self, token: &str) -> String;
}

/// Deterministic Spanish suffix stripper. Not a linguistically complete
/// lemmatizer — it normalizes the common plural/gender/verb-ending
/// variation enough that repeated mentions of the same concept collapse to
/// the same token.
#[derive(Default)]
pub struct SuffixStripLemmatizer;

impl Lemmatizer for SuffixStripLemmatizer {
    fn lemmatize(&self, token: &str) -> String {
        let suffixes = ["aciones", "amiento", "imiento", "ciones", "mente", "ando", "iendo", "ado", "ada", "idos", "idas", "es", "os", "as"];
        for suffix in suffixes {
            if token.len() > suffix.len() + 3 && token.ends_with(suffix) {
                return token[..token.len() - suffix.len()].to_string();
            }
        }
        token.to_string()
    }
}

const STOPWORDS: &[&str] = &[
    "para", "como", "pero", "esta", "este", "esto", "estos", "estas", "desde", "hasta",
    "donde", "cuando", "porque", "tambien", "también", "entre", "sobre", "cada", "todo",
    "toda", "todos", "todas", "mismo", "misma", "otro", "otra", "otros", "otras", "tiene",
    "tienen", "puede", "pueden", "hacer", "hace", "solo", "sólo", "bien", "mucho", "mucha",
    "muchos", "muchas", "poco", "poca", "siempre", "nunca", "ahora", "aqui", "aquí", "alli",
    "allí", "ellos", "ellas", "nosotros", "nosotras", "ustedes", "usted", "aunque", "mientras",
    "durante", "antes", "despues", "después", "luego", "entonces", "asi", "así", "cual",
    "cuales", "cuáles", "quien", "quienes", "quién", "quiénes", "cuanto", "cuanta", "cuántos",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn strip_accents(c: char) -> char {
    match c {
        'á' => 'a', 'é' => 'e', 'í' => 'i', 'ó' => 'o', 'ú' => 'u',
        'Á' => 'A', 'É' => 'E', 'Í' => 'I', 'Ó' => 'O', 'Ú' => 'U',
        'ñ' => 'n', 'Ñ' => 'N', 'ü' => 'u', 'Ü' => 'U',
        other => other,
    }
}

/// Extract a deduplicated, lemmatized keyword set from `text`.
///
/// Filters: lowercase, alphabetic-only tokens, length > 3 after accent
/// normalization, not a stopword.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    extract_keywords_with(text, &SuffixStripLemmatizer)
}

pub fn extract_keywords_with(text: &str, lemmatizer: &dyn Lemmatizer) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for raw_token in text.split(|c: char| !c.is_alphabetic()) {
        if raw_token.is_empty() {
            continue;
        }
        let lower: String = raw_token.to_lowercase();
        if lower.chars().count() <= 3 {
            continue;
        }
        if is_stopword(&lower) {
            continue;
        }
        let lemma = lemmatizer.lemmatize(&lower);
        let normalized: String = lemma.chars().map(strip_accents).collect();
        out.insert(normalized);
    }
    out
}

/// Jaccard similarity between two keyword sets: `|A∩B| / |A∪B|`, or `0.0`
/// if either is empty.
pub fn keyword_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_short_and_stop_words() {
        let kws = extract_keywords("el y la de con muy cosas importantes discutidas hoy");
        assert!(!kws.iter().any(|k| k == "con" || k == "muy"));
        assert!(kws.contains("cosas"));
        assert!(kws.contains("importantes") || kws.contains("important"));
    }

    #[test]
    fn deduplicates_via_set() {
        let kws = extract_keywords("proyecto proyecto proyectos sobre el proyecto");
        // all variants collapse toward the same stem-ish form, set dedups exact matches
        assert!(kws.len() <= 2);
    }

    #[test]
    fn accent_normalization_is_consistent() {
        let a = extract_keywords("reunión importante sobre presupuesto");
        let b = extract_keywords("reunion importante sobre presupuesto");
        assert_eq!(a, b);
    }

    #[test]
    fn jaccard_empty_sets_is_zero() {
        let empty = BTreeSet::new();
        let other: BTreeSet<String> = ["hola".to_string()].into_iter().collect();
        assert_eq!(keyword_jaccard(&empty, &other), 0.0);
        assert_eq!(keyword_jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn jaccard_identical_sets_is_one() {
        let a: BTreeSet<String> = ["proyecto".to_string(), "reunion".to_string()].into_iter().collect();
        assert_eq!(keyword_jaccard(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        let a: BTreeSet<String> = ["uno".to_string(), "dos".to_string()].into_iter().collect();
        let b: BTreeSet<String> = ["dos".to_string(), "tres".to_string()].into_iter().collect();
        // intersection 1, union 3
        assert!((keyword_jaccard(&a, &b) - (1.0 / 3.0)).abs() < 1e-6);
    }
}
