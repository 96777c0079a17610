//! Batch relationship inference.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use simgraph_core::config::DEFAULT_SIMILARITY_THRESHOLD;
use simgraph_core::{
    AppConfig, Post, PostNode, PriorEdge, ReconciliationPlan, SentimentLabel, SimilarityEdge,
    UserNode, UserPair,
};

use crate::classifier::{Sentiment, SentimentClassifier};
use crate::error::{InferenceError, LexiconError};
use crate::lexicon::Lexicon;
use crate::similarity::SimilarityScorer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceConfig {
    /// A cross-author post pair is relationship evidence when its similarity
    /// is at least this value (and above zero).
    pub similarity_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Turns a batch of posts into a [`ReconciliationPlan`].
///
/// Pure in-memory transformation: no I/O, no shared state. Comparison is
/// O(P²) over the batch.
#[derive(Debug, Clone, Default)]
pub struct InferenceEngine {
    classifier: SentimentClassifier,
    scorer: SimilarityScorer,
    config: InferenceConfig,
}

/// Best post pair seen so far for one user pair.
struct Evidence {
    score: f64,
    /// Index of the post authored by `pair.user_a()`.
    post_a: usize,
    /// Index of the post authored by `pair.user_b()`.
    post_b: usize,
}

#[derive(Default)]
struct UserTally<'a> {
    name: Option<&'a str>,
    labels: Vec<SentimentLabel>,
}

impl InferenceEngine {
    #[must_use]
    pub fn new(
        classifier: SentimentClassifier,
        scorer: SimilarityScorer,
        config: InferenceConfig,
    ) -> Self {
        Self {
            classifier,
            scorer,
            config,
        }
    }

    /// Build an engine from application settings: the configured threshold,
    /// and the YAML lexicon at `lexicon_path` when one is set.
    ///
    /// # Errors
    ///
    /// Returns [`LexiconError`] if the lexicon file cannot be loaded.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, LexiconError> {
        let lexicon = match &config.lexicon_path {
            Some(path) => Lexicon::from_path(path)?,
            None => Lexicon::default(),
        };
        Ok(Self::new(
            SentimentClassifier::new(lexicon),
            SimilarityScorer::default(),
            InferenceConfig {
                similarity_threshold: config.similarity_threshold,
            },
        ))
    }

    #[must_use]
    pub fn classifier(&self) -> &SentimentClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn config(&self) -> InferenceConfig {
        self.config
    }

    /// Classify a single text with the engine's lexicon.
    #[must_use]
    pub fn classify(&self, text: &str) -> Sentiment {
        self.classifier.classify(text)
    }

    /// Derive users, post annotations, and `SIMILAR_CONTENT` edges from `posts`.
    ///
    /// 1. Classify every post; each user's sentiment is the majority label of
    ///    their posts (ties resolve to neutral).
    /// 2. Score every pair of posts written by different users.
    /// 3. Keep pairs scoring at least the threshold as evidence.
    /// 4. Per user pair keep the highest-scoring post pair; equal scores go to
    ///    the lexicographically lower pair of post ids.
    /// 5. Emit one edge per user pair, labelled with the majority sentiment of
    ///    its two justifying posts.
    /// 6. Any `prior_edges` entry without evidence in this batch is listed in
    ///    `edges_retract`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidInput`] if a post has an empty id, an
    /// empty author id, or reuses another post's id. Text content never
    /// causes an error.
    pub fn infer(
        &self,
        posts: &[Post],
        prior_edges: Option<&[PriorEdge]>,
    ) -> Result<ReconciliationPlan, InferenceError> {
        validate_posts(posts)?;

        let post_nodes: Vec<PostNode> = posts
            .iter()
            .map(|post| {
                let sentiment = self.classifier.classify(&post.text);
                PostNode {
                    id: post.id.clone(),
                    author_id: post.author_id.clone(),
                    text: post.text.clone(),
                    sentiment: sentiment.label,
                    score: sentiment.score,
                }
            })
            .collect();

        let users = aggregate_users(posts, &post_nodes);
        let evidence = self.collect_evidence(posts);

        let edges_upsert: Vec<SimilarityEdge> = evidence
            .iter()
            .map(|(pair, ev)| SimilarityEdge {
                pair: pair.clone(),
                score: ev.score,
                label: SentimentLabel::majority([
                    post_nodes[ev.post_a].sentiment,
                    post_nodes[ev.post_b].sentiment,
                ]),
                justification_posts: (posts[ev.post_a].id.clone(), posts[ev.post_b].id.clone()),
            })
            .collect();

        let edges_retract: Vec<UserPair> = prior_edges
            .unwrap_or_default()
            .iter()
            .map(|prior| &prior.pair)
            .filter(|pair| !evidence.contains_key(*pair))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::info!(
            posts = posts.len(),
            users = users.len(),
            edges = edges_upsert.len(),
            retractions = edges_retract.len(),
            threshold = self.config.similarity_threshold,
            "inference complete"
        );

        Ok(ReconciliationPlan {
            users,
            posts: post_nodes,
            edges_upsert,
            edges_retract,
        })
    }

    fn collect_evidence(&self, posts: &[Post]) -> BTreeMap<UserPair, Evidence> {
        let terms: Vec<_> = posts.iter().map(|p| self.scorer.terms(&p.text)).collect();
        let mut evidence: BTreeMap<UserPair, Evidence> = BTreeMap::new();

        for i in 0..posts.len() {
            for j in (i + 1)..posts.len() {
                if posts[i].author_id == posts[j].author_id {
                    continue;
                }
                let score = terms[i].jaccard(&terms[j]);
                if score <= 0.0 || score < self.config.similarity_threshold {
                    continue;
                }

                let pair = UserPair::new(posts[i].author_id.as_str(), posts[j].author_id.as_str());
                let (post_a, post_b) = if posts[i].author_id == pair.user_a() {
                    (i, j)
                } else {
                    (j, i)
                };
                let candidate = Evidence {
                    score,
                    post_a,
                    post_b,
                };

                match evidence.entry(pair) {
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                    Entry::Occupied(mut slot) => {
                        if candidate.beats(slot.get(), posts) {
                            slot.insert(candidate);
                        }
                    }
                }
            }
        }

        evidence
    }
}

impl Evidence {
    fn beats(&self, other: &Evidence, posts: &[Post]) -> bool {
        if self.score != other.score {
            return self.score > other.score;
        }
        self.id_key(posts) < other.id_key(posts)
    }

    /// Post ids of the pair in ascending order.
    fn id_key<'a>(&self, posts: &'a [Post]) -> (&'a str, &'a str) {
        let a = posts[self.post_a].id.as_str();
        let b = posts[self.post_b].id.as_str();
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

fn validate_posts(posts: &[Post]) -> Result<(), InferenceError> {
    let mut seen = HashSet::with_capacity(posts.len());
    for (index, post) in posts.iter().enumerate() {
        let invalid = |reason: &str| InferenceError::InvalidInput {
            index,
            post_id: post.id.clone(),
            reason: reason.to_owned(),
        };
        if post.id.trim().is_empty() {
            return Err(invalid("post id is empty"));
        }
        if post.author_id.trim().is_empty() {
            return Err(invalid("post is missing an author identifier"));
        }
        if !seen.insert(post.id.as_str()) {
            return Err(invalid("duplicate post id"));
        }
    }
    Ok(())
}

fn aggregate_users(posts: &[Post], post_nodes: &[PostNode]) -> Vec<UserNode> {
    let mut tallies: BTreeMap<&str, UserTally<'_>> = BTreeMap::new();
    for (post, node) in posts.iter().zip(post_nodes) {
        let tally = tallies.entry(post.author_id.as_str()).or_default();
        if tally.name.is_none() {
            tally.name = post
                .author_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty());
        }
        tally.labels.push(node.sentiment);
    }

    tallies
        .into_iter()
        .map(|(id, tally)| UserNode {
            id: id.to_owned(),
            name: tally.name.unwrap_or(id).to_owned(),
            sentiment: SentimentLabel::majority(tally.labels.iter().copied()),
            post_count: tally.labels.len(),
        })
        .collect()
}
