//! Lexicon-based sentiment classifier.

use serde::Serialize;
use simgraph_core::SentimentLabel;

use crate::lexicon::Lexicon;
use crate::text::tokenize;

/// Label and raw score for one block of text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// Signed sum of token weights. `0.0` for empty or unknown text.
    pub score: f64,
}

/// Scores text by summing lexicon weights over its tokens.
///
/// A token directly preceded by a negation word contributes its weight with
/// the sign flipped. Classification is pure: the same text always produces
/// the same [`Sentiment`].
#[derive(Debug, Clone, Default)]
pub struct SentimentClassifier {
    lexicon: Lexicon,
}

impl SentimentClassifier {
    #[must_use]
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    #[must_use]
    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> Sentiment {
        let mut score = 0.0_f64;
        let mut negate_next = false;
        for token in tokenize(text) {
            let weight = self.lexicon.weight(&token);
            score += if negate_next { -weight } else { weight };
            negate_next = self.lexicon.is_negation(&token);
        }
        Sentiment {
            label: SentimentLabel::from_score(score),
            score,
        }
    }
}
