//! Offline inference over posts read from JSON files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use simgraph_core::config::DEFAULT_SIMILARITY_THRESHOLD;
use simgraph_core::{Post, PriorEdge, ReconciliationPlan, SimilarityEdge};
use simgraph_engine::{
    InferenceConfig, InferenceEngine, Lexicon, SentimentClassifier, SimilarityScorer,
};
use simgraph_reconcile::{MemoryGraphStore, ReconcileReport, Reconciler};

#[derive(Debug)]
pub(crate) struct InferOptions {
    pub posts: PathBuf,
    pub prior: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub lexicon: Option<PathBuf>,
    pub simulate: bool,
}

/// Plan plus the graph it produces when applied to an empty store.
#[derive(Debug, Serialize)]
pub(crate) struct Simulation {
    pub plan: ReconciliationPlan,
    pub report: ReconcileReport,
    pub edges: Vec<SimilarityEdge>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub(crate) fn build_engine(
    threshold: Option<f64>,
    lexicon: Option<&Path>,
) -> anyhow::Result<InferenceEngine> {
    let lexicon = match lexicon {
        Some(path) => Lexicon::from_path(path)?,
        None => Lexicon::default(),
    };
    Ok(InferenceEngine::new(
        SentimentClassifier::new(lexicon),
        SimilarityScorer::default(),
        InferenceConfig {
            similarity_threshold: threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
        },
    ))
}

/// Build the plan for the files named in `options`.
///
/// # Errors
///
/// Returns an error if an input file cannot be read or parsed, the lexicon is
/// invalid, or a post fails validation.
pub(crate) fn plan_from_files(options: &InferOptions) -> anyhow::Result<ReconciliationPlan> {
    let engine = build_engine(options.threshold, options.lexicon.as_deref())?;
    let posts: Vec<Post> = read_json(&options.posts)?;
    let prior: Option<Vec<PriorEdge>> = options
        .prior
        .as_deref()
        .map(read_json::<Vec<PriorEdge>>)
        .transpose()?;
    Ok(engine.infer(&posts, prior.as_deref())?)
}

/// Apply `plan` to a fresh [`MemoryGraphStore`].
///
/// # Errors
///
/// Returns an error if the in-memory store rejects an operation.
pub(crate) async fn simulate(plan: ReconciliationPlan) -> anyhow::Result<Simulation> {
    let reconciler = Reconciler::new(MemoryGraphStore::new());
    let report = reconciler.reconcile(&plan).await?;
    let graph = reconciler.store().snapshot()?;
    Ok(Simulation {
        plan,
        report,
        edges: graph.edges.into_values().collect(),
    })
}

/// Print the plan (or the simulation) as JSON on stdout.
///
/// # Errors
///
/// See [`plan_from_files`] and [`simulate`].
pub(crate) async fn run_infer(options: &InferOptions) -> anyhow::Result<()> {
    let plan = plan_from_files(options)?;
    let output = if options.simulate {
        serde_json::to_string_pretty(&simulate(plan).await?)?
    } else {
        serde_json::to_string_pretty(&plan)?
    };
    println!("{output}");
    Ok(())
}
