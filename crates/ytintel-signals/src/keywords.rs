//! Frequency-ranked keyword extraction.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub(crate) static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Unicode letters/digits, optionally joined by an apostrophe ("creator's").
    Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)*").expect("keyword regex is valid")
});

const MIN_TOKEN_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "can't", "could", "did", "didn't", "do", "does", "doesn't",
    "doing", "don't", "down", "during", "each", "even", "every", "few", "for", "from", "further",
    "get", "got", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "i'm", "if", "in", "into", "is", "isn't", "it", "it's", "its", "just", "like",
    "more", "most", "much", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "one",
    "only", "or", "other", "our", "ours", "out", "over", "own", "really", "same", "she",
    "should", "so", "some", "such", "than", "that", "that's", "the", "their", "theirs", "them",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "wasn't", "way", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "you're", "your", "yours",
    "http", "https", "www", "com",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

fn keep(token: &str) -> bool {
    token.chars().count() >= MIN_TOKEN_CHARS
        && !token.chars().all(|c| c.is_numeric())
        && !is_stop_word(token)
}

/// Rank the most frequent non-stop-word terms across `texts`.
///
/// Texts are lowercased and tokenized into Unicode words. Stop words,
/// tokens shorter than three characters, and purely numeric tokens are
/// dropped. Each term's weight is its share of the kept tokens. Ties in
/// count keep first-occurrence order.
#[must_use]
pub fn top_keywords<'a, I>(texts: I, k: usize) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    if k == 0 {
        return Vec::new();
    }

    // term -> (count, first occurrence index)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut kept = 0usize;

    for text in texts {
        let lowered = text.replace('’', "'").to_lowercase();
        for m in WORD_RE.find_iter(&lowered) {
            let token = m.as_str();
            if !keep(token) {
                continue;
            }
            let order = counts.len();
            counts
                .entry(token.to_string())
                .and_modify(|(count, _)| *count += 1)
                .or_insert((1, order));
            kept += 1;
        }
    }

    if kept == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    #[allow(clippy::cast_precision_loss)]
    let total = kept as f64;
    ranked
        .into_iter()
        .take(k)
        .map(|(term, count, _)| {
            #[allow(clippy::cast_precision_loss)]
            let weight = count as f64 / total;
            (term, weight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_keywords() {
        assert!(top_keywords(Vec::<&str>::new(), 5).is_empty());
        assert!(top_keywords(["", "   "], 5).is_empty());
    }

    #[test]
    fn stop_words_short_and_numeric_tokens_are_dropped() {
        let out = top_keywords(["the and of is 2024 ok to be"], 5);
        assert!(out.is_empty(), "got {out:?}");
    }

    #[test]
    fn ranks_by_frequency() {
        let out = top_keywords(["rust rust rust tokio tokio serde"], 3);
        let terms: Vec<&str> = out.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["rust", "tokio", "serde"]);
        assert!((out[0].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_first_occurrence_order() {
        let out = top_keywords(["zebra apple", "mango zebra apple mango"], 3);
        let terms: Vec<&str> = out.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn case_and_punctuation_are_normalized() {
        let out = top_keywords(["Guitar! guitar, GUITAR? tutorial."], 2);
        assert_eq!(out[0].0, "guitar");
        assert_eq!(out[1].0, "tutorial");
    }

    #[test]
    fn truncates_to_k() {
        let out = top_keywords(["alpha beta gamma delta epsilon"], 2);
        assert_eq!(out.len(), 2);
        assert!(top_keywords(["alpha"], 0).is_empty());
    }

    #[test]
    fn weights_sum_to_one_when_all_terms_returned() {
        let out = top_keywords(["camera lens camera light"], 10);
        let sum: f64 = out.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
