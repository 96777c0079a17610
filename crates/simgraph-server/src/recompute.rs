//! Load stored posts, infer relationships, and reconcile the result.
//!
//! Shared by the recompute endpoint, post creation, and the scheduled job.

use std::time::Duration;

use serde::Serialize;
use simgraph_core::ReconciliationPlan;
use simgraph_db::{is_transient_sqlx_error, DbError};
use simgraph_engine::InferenceError;
use simgraph_reconcile::{ReconcileError, ReconcileReport};
use thiserror::Error;

use crate::api::AppState;

/// Size of a plan, reported back to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub users: usize,
    pub posts: usize,
    pub edges_upserted: usize,
    pub edges_retracted: usize,
}

impl From<&ReconciliationPlan> for PlanSummary {
    fn from(plan: &ReconciliationPlan) -> Self {
        Self {
            users: plan.users.len(),
            posts: plan.posts.len(),
            edges_upserted: plan.edges_upsert.len(),
            edges_retracted: plan.edges_retract.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecomputeOutcome {
    pub plan: PlanSummary,
    pub report: ReconcileReport,
}

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("failed to load graph inputs: {0}")]
    Load(#[from] DbError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl RecomputeError {
    /// `true` when running the recompute again later may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            RecomputeError::Load(DbError::Sqlx(e)) => is_transient_sqlx_error(e),
            RecomputeError::Load(_) | RecomputeError::Inference(_) => false,
            RecomputeError::Reconcile(e) => e.is_retriable(),
        }
    }
}

/// Rebuild every relationship from the stored posts.
///
/// Runs are serialized per process: a second caller waits for the first to
/// finish, then reads the posts it wrote.
pub async fn recompute(state: &AppState) -> Result<RecomputeOutcome, RecomputeError> {
    let _guard = state.recompute_lock.lock().await;

    let posts = simgraph_db::list_posts_for_inference(&state.pool).await?;
    let prior = simgraph_db::list_prior_edges(&state.pool).await?;
    let plan = state.engine.infer(&posts, Some(&prior))?;
    let summary = PlanSummary::from(&plan);

    let deadline = Duration::from_secs(state.config.reconcile_timeout_secs);
    let report = state
        .reconciler
        .reconcile_with_deadline(&plan, deadline)
        .await?;
    Ok(RecomputeOutcome {
        plan: summary,
        report,
    })
}
