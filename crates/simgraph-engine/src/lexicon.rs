//! Word-weight table used by the sentiment classifier.
//!
//! A [`Lexicon`] is an immutable value handed to the classifier at
//! construction. The built-in table is available through
//! [`Lexicon::default`]; deployments can replace it with a YAML file of the
//! form:
//!
//! ```yaml
//! weights:
//!   love: 1.0
//!   awful: -1.0
//! negations: [not, never]
//! ```
//!
//! When `negations` is omitted the built-in negation list is kept.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::LexiconError;
use crate::text::tokenize;

/// Built-in word weights. Positive values push toward a positive label.
pub(crate) const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    // Positive signals
    ("good", 0.5),
    ("great", 0.75),
    ("awesome", 0.75),
    ("excellent", 1.0),
    ("happy", 0.5),
    ("love", 1.0),
    ("loved", 1.0),
    ("wonderful", 0.75),
    ("amazing", 0.75),
    ("best", 0.75),
    ("nice", 0.5),
    ("glad", 0.5),
    ("fantastic", 1.0),
    ("enjoy", 0.5),
    ("enjoyed", 0.5),
    ("fun", 0.5),
    // Negative signals
    ("bad", -0.5),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("hate", -1.0),
    ("hated", -1.0),
    ("sad", -0.5),
    ("angry", -0.75),
    ("poor", -0.5),
    ("worst", -1.0),
    ("horrible", -1.0),
    ("boring", -0.5),
    ("annoying", -0.5),
    ("disappointed", -0.75),
    ("upset", -0.5),
];

/// Words that flip the polarity of the token right after them.
pub(crate) const DEFAULT_NEGATIONS: &[&str] = &[
    "not", "no", "never", "nor", "without", "hardly", "cannot", "dont", "doesnt", "didnt",
    "isnt", "wasnt", "arent", "werent", "cant", "wont", "wouldnt", "shouldnt", "couldnt",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    weights: HashMap<String, f64>,
    negations: HashSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LexiconFile {
    weights: BTreeMap<String, f64>,
    #[serde(default)]
    negations: Option<Vec<String>>,
}

impl Lexicon {
    /// Build a lexicon from explicit weights and negation words.
    ///
    /// Entries go through the same tokenizer as post text, so `Don't` is
    /// stored as `dont`.
    ///
    /// # Errors
    ///
    /// Returns [`LexiconError::InvalidWord`] if an entry is not exactly one
    /// token, or [`LexiconError::NonFiniteWeight`] for `NaN`/infinite weights.
    pub fn new<W, N, S>(weights: W, negations: N) -> Result<Self, LexiconError>
    where
        W: IntoIterator<Item = (S, f64)>,
        N: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (word, weight) in weights {
            let word = normalize_entry(word.as_ref())?;
            if !weight.is_finite() {
                return Err(LexiconError::NonFiniteWeight { word });
            }
            table.insert(word, weight);
        }

        let negations = negations
            .into_iter()
            .map(|w| normalize_entry(w.as_ref()))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Self {
            weights: table,
            negations,
        })
    }

    /// Parse a lexicon from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`LexiconError::Yaml`] on malformed YAML, or any error from
    /// [`Lexicon::new`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, LexiconError> {
        let file: LexiconFile = serde_yaml::from_str(yaml)?;
        match file.negations {
            Some(negations) => Self::new(file.weights, negations),
            None => Self::new(
                file.weights,
                DEFAULT_NEGATIONS.iter().map(|w| (*w).to_owned()),
            ),
        }
    }

    /// Load a lexicon from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`LexiconError::Io`] if the file cannot be read, or any error
    /// from [`Lexicon::from_yaml_str`].
    pub fn from_path(path: &Path) -> Result<Self, LexiconError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LexiconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let lexicon = Self::from_yaml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            words = lexicon.len(),
            "loaded sentiment lexicon"
        );
        Ok(lexicon)
    }

    /// Weight of `token`, or `0.0` when the word is not in the table.
    #[must_use]
    pub fn weight(&self, token: &str) -> f64 {
        self.weights.get(token).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn is_negation(&self, token: &str) -> bool {
        self.negations.contains(token)
    }

    /// Number of weighted words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS
                .iter()
                .map(|&(word, weight)| (word.to_owned(), weight))
                .collect(),
            negations: DEFAULT_NEGATIONS.iter().map(|w| (*w).to_owned()).collect(),
        }
    }
}

fn normalize_entry(raw: &str) -> Result<String, LexiconError> {
    let mut tokens = tokenize(raw);
    if tokens.len() == 1 {
        Ok(tokens.remove(0))
    } else {
        Err(LexiconError::InvalidWord(raw.to_owned()))
    }
}
