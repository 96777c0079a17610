//! Relationship inference for simgraph.
//!
//! Classifies each post with a lexicon scorer, compares every cross-author
//! pair of posts by term overlap, and turns the result into a
//! [`ReconciliationPlan`](simgraph_core::ReconciliationPlan) for the
//! reconciler to apply. Everything here is synchronous and performs no I/O.

pub mod classifier;
pub mod error;
pub mod inference;
pub mod lexicon;
pub mod similarity;
pub mod text;

pub use classifier::{Sentiment, SentimentClassifier};
pub use error::{InferenceError, LexiconError};
pub use inference::{InferenceConfig, InferenceEngine};
pub use lexicon::Lexicon;
pub use similarity::{SimilarityScorer, TermSet};
