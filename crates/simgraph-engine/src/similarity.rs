//! Term-overlap similarity between post texts.

use std::collections::{BTreeSet, HashSet};

use crate::text::tokenize;

/// English function words that carry no topical signal.
pub(crate) const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "but", "by", "can", "could", "did", "do",
    "does", "doing", "for", "from", "get", "got", "had", "has", "have", "having", "he", "her",
    "here", "him", "his", "how", "i", "if", "im", "in", "into", "is", "it", "its", "ive", "just",
    "me", "more", "my", "myself", "of", "off", "on", "one", "only", "or", "our", "out", "over",
    "own", "really", "she", "so", "some", "such", "than", "that", "thats", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "to", "too", "up", "us", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "why", "will", "with",
    "would", "you", "your", "youre",
];

/// Normalized, deduplicated terms of one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermSet(BTreeSet<String>);

impl TermSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        self.0.contains(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Jaccard coefficient `|A ∩ B| / |A ∪ B|`, or `0.0` when both are empty.
    #[must_use]
    pub fn jaccard(&self, other: &TermSet) -> f64 {
        let intersection = self.0.intersection(&other.0).count();
        let union = self.0.len() + other.0.len() - intersection;
        if union == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let score = intersection as f64 / union as f64;
        score
    }
}

/// Scores content overlap between two texts in `[0, 1]`.
///
/// Texts are tokenized, stopwords are dropped, and the remaining terms are
/// compared as sets. The score is symmetric and never fails; degenerate input
/// scores `0.0`.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    stopwords: HashSet<String>,
}

impl SimilarityScorer {
    /// Build a scorer with a custom stopword list. Entries are normalized with
    /// the post tokenizer, so `"it's"` removes the token `its`.
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .flat_map(|w| tokenize(w.as_ref()))
                .collect(),
        }
    }

    #[must_use]
    pub fn terms(&self, text: &str) -> TermSet {
        TermSet(
            tokenize(text)
                .into_iter()
                .filter(|t| !self.stopwords.contains(t))
                .collect(),
        )
    }

    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> f64 {
        self.terms(a).jaccard(&self.terms(b))
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_STOPWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        let scorer = SimilarityScorer::default();
        let text = "Hiking the ridge trail at sunrise";
        assert!((scorer.score(text, text) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_is_symmetric() {
        let scorer = SimilarityScorer::default();
        let pairs = [
            ("I love this, it's great", "I love this too, amazing"),
            ("rust borrow checker", "the borrow checker hates me"),
            ("", "something"),
            ("cats", "dogs"),
        ];
        for (a, b) in pairs {
            assert_eq!(scorer.score(a, b), scorer.score(b, a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn disjoint_text_scores_zero() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score("apples oranges", "trains planes"), 0.0);
    }

    #[test]
    fn empty_and_stopword_only_text_scores_zero() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score("", ""), 0.0);
        assert_eq!(scorer.score("the and of", "the and of"), 0.0);
        assert_eq!(scorer.score("!!!", "hello"), 0.0);
    }

    #[test]
    fn stopwords_and_punctuation_are_ignored() {
        let scorer = SimilarityScorer::default();
        let terms = scorer.terms("I love this, it's GREAT!");
        let collected: Vec<&str> = terms.iter().collect();
        assert_eq!(collected, vec!["great", "love"]);
    }

    #[test]
    fn overlap_is_jaccard() {
        let scorer = SimilarityScorer::default();
        // {love, great} vs {love, amazing}: 1 shared of 3 total.
        let score = scorer.score("I love this, it's great", "I love this too, amazing");
        assert!((score - 1.0 / 3.0).abs() < 1e-12, "got {score}");
    }

    #[test]
    fn repeated_terms_count_once() {
        let scorer = SimilarityScorer::default();
        assert!((scorer.score("coffee coffee coffee", "coffee") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn custom_stopwords_are_normalized() {
        let scorer = SimilarityScorer::new(["It's", "Coffee"]);
        let terms = scorer.terms("its coffee time");
        assert!(!terms.contains("its"));
        assert!(!terms.contains("coffee"));
        assert!(terms.contains("time"));
        assert_eq!(terms.len(), 1);
    }
}
