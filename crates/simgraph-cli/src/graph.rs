//! Database-backed command handlers.

use std::time::Duration;

use simgraph_core::AppConfig;
use simgraph_db::PgGraphStore;
use simgraph_engine::InferenceEngine;
use simgraph_reconcile::{Reconciler, RetryPolicy};

/// Re-run inference over every stored post and reconcile the graph.
///
/// With `dry_run` the plan is printed as JSON and nothing is written.
///
/// # Errors
///
/// Returns an error if loading fails, inference rejects a stored post, or
/// reconciliation stops early. The unapplied operations are logged.
pub(crate) async fn run_recompute(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let engine = InferenceEngine::from_app_config(config)?;
    let posts = simgraph_db::list_posts_for_inference(pool).await?;
    let prior = simgraph_db::list_prior_edges(pool).await?;
    let plan = engine.infer(&posts, Some(&prior))?;

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let reconciler = Reconciler::with_retry(
        PgGraphStore::new(pool.clone()),
        RetryPolicy::from_app_config(config),
    );
    let deadline = Duration::from_secs(config.reconcile_timeout_secs);
    match reconciler.reconcile_with_deadline(&plan, deadline).await {
        Ok(report) => {
            println!(
                "reconciled {} users, {} posts, {} edges upserted, {} edges retracted",
                report.users_upserted,
                report.posts_upserted,
                report.edges_upserted,
                report.edges_retracted
            );
            Ok(())
        }
        Err(err) => {
            for op in err.unapplied() {
                tracing::warn!(operation = %op, "unapplied");
            }
            Err(anyhow::Error::new(err).context("graph reconciliation failed"))
        }
    }
}

/// Print stored users and `SIMILAR_CONTENT` edges as two tables.
///
/// # Errors
///
/// Returns an error if the snapshot query fails.
pub(crate) async fn run_graph(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let snapshot = simgraph_db::graph_snapshot(pool).await?;

    if snapshot.users.is_empty() {
        println!("no users found; create users and posts first");
        return Ok(());
    }

    println!("{:<38}{:<25}{:<10}POSTS", "USER", "NAME", "SENTIMENT");
    for user in &snapshot.users {
        println!(
            "{:<38}{:<25}{:<10}{}",
            user.user_id, user.name, user.sentiment, user.post_count
        );
    }

    println!();
    if snapshot.edges.is_empty() {
        println!("no relationships; run `recompute`");
        return Ok(());
    }
    println!("{:<38}{:<38}{:<8}{:<10}POSTS", "USER A", "USER B", "SCORE", "LABEL");
    for edge in &snapshot.edges {
        println!(
            "{:<38}{:<38}{:<8.3}{:<10}{}, {}",
            edge.user_a, edge.user_b, edge.score, edge.label, edge.post_a, edge.post_b
        );
    }
    Ok(())
}
