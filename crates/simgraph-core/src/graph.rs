//! Graph domain types shared by the inference engine, the reconciler, and
//! the storage backends.
//!
//! Relationships between users are undirected. [`UserPair`] is the only way
//! to key an edge and always stores its two identifiers in lexicographic
//! order, so `(a, b)` and `(b, a)` address the same edge everywhere.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Relationship type name used by graph-shaped backends.
pub const SIMILAR_CONTENT: &str = "SIMILAR_CONTENT";

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Polarity label derived from a lexicon score.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    #[default]
    Neutral,
}

#[derive(Debug, Error)]
#[error("unknown sentiment label: {0}")]
pub struct UnknownSentimentLabel(pub String);

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    /// `> 0` is positive, `< 0` is negative, anything else is neutral.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            SentimentLabel::Positive
        } else if score < 0.0 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    /// Majority label over `labels`. A tie for first place, or no labels at
    /// all, resolves to [`SentimentLabel::Neutral`].
    #[must_use]
    pub fn majority<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = SentimentLabel>,
    {
        let mut positive = 0usize;
        let mut negative = 0usize;
        let mut neutral = 0usize;
        for label in labels {
            match label {
                SentimentLabel::Positive => positive += 1,
                SentimentLabel::Negative => negative += 1,
                SentimentLabel::Neutral => neutral += 1,
            }
        }

        if positive > negative && positive > neutral {
            SentimentLabel::Positive
        } else if negative > positive && negative > neutral {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = UnknownSentimentLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            _ => Err(UnknownSentimentLabel(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// A post as handed to the inference engine.
///
/// `author_id` defaults to the empty string when absent so that a malformed
/// record reaches the engine's validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, alias = "author", deserialize_with = "string_or_number")]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, alias = "content")]
    pub text: String,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            author_name: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }
}

/// Accepts `"7"` and `7` alike; JSON batches in the wild use both for ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Edge keys
// ---------------------------------------------------------------------------

/// Canonical, order-independent key for a pair of users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "UserPairRepr")]
pub struct UserPair {
    user_a: String,
    user_b: String,
}

#[derive(Deserialize)]
struct UserPairRepr {
    #[serde(deserialize_with = "string_or_number")]
    user_a: String,
    #[serde(deserialize_with = "string_or_number")]
    user_b: String,
}

impl From<UserPairRepr> for UserPair {
    fn from(repr: UserPairRepr) -> Self {
        UserPair::new(repr.user_a, repr.user_b)
    }
}

impl UserPair {
    /// Build the pair, putting the lexicographically smaller id first.
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        let (x, y) = (x.into(), y.into());
        if x <= y {
            Self {
                user_a: x,
                user_b: y,
            }
        } else {
            Self {
                user_a: y,
                user_b: x,
            }
        }
    }

    #[must_use]
    pub fn user_a(&self) -> &str {
        &self.user_a
    }

    #[must_use]
    pub fn user_b(&self) -> &str {
        &self.user_b
    }

    #[must_use]
    pub fn is_self_pair(&self) -> bool {
        self.user_a == self.user_b
    }
}

impl fmt::Display for UserPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}--{}", self.user_a, self.user_b)
    }
}

// ---------------------------------------------------------------------------
// Derived entities
// ---------------------------------------------------------------------------

/// A user node with its aggregate sentiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNode {
    pub id: String,
    pub name: String,
    pub sentiment: SentimentLabel,
    #[serde(default)]
    pub post_count: usize,
}

/// A post annotated with its classified sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostNode {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub sentiment: SentimentLabel,
    pub score: f64,
}

/// A `SIMILAR_CONTENT` relationship between two distinct users.
///
/// `justification_posts.0` is authored by `pair.user_a()` and
/// `justification_posts.1` by `pair.user_b()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    #[serde(flatten)]
    pub pair: UserPair,
    pub score: f64,
    pub label: SentimentLabel,
    pub justification_posts: (String, String),
}

/// An edge known from a previous run, used to detect retractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorEdge {
    #[serde(flatten)]
    pub pair: UserPair,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub label: SentimentLabel,
}

/// Node write accepted by a graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeUpsert {
    User(UserNode),
    Post(PostNode),
}

impl NodeUpsert {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            NodeUpsert::User(u) => &u.id,
            NodeUpsert::Post(p) => &p.id,
        }
    }
}

/// Everything one inference run wants the store to look like.
///
/// The engine computes it; the reconciler applies it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub users: Vec<UserNode>,
    #[serde(default)]
    pub posts: Vec<PostNode>,
    pub edges_upsert: Vec<SimilarityEdge>,
    #[serde(default)]
    pub edges_retract: Vec<UserPair>,
}

impl ReconciliationPlan {
    /// Total number of store operations needed to apply the plan.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.users.len() + self.posts.len() + self.edges_upsert.len() + self.edges_retract.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }
}
