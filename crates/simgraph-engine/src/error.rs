use std::path::PathBuf;

use thiserror::Error;

/// Structural problems in an inference batch. Text content never fails.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid post at index {index} ({post_id}): {reason}")]
    InvalidInput {
        index: usize,
        post_id: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lexicon YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The entry does not normalize to exactly one token.
    #[error("lexicon entry '{0}' is not a single word")]
    InvalidWord(String),

    #[error("lexicon weight for '{word}' is not a finite number")]
    NonFiniteWeight { word: String },
}
