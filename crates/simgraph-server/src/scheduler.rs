//! Background job scheduler.
//!
//! Registers the optional graph recompute job when `SIMGRAPH_RECOMPUTE_CRON`
//! is set.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::AppState;
use crate::recompute;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match state.config.recompute_cron.clone() {
        Some(schedule) => register_recompute_job(&scheduler, &schedule, state).await?,
        None => tracing::info!("scheduler: no recompute schedule configured"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register a recurring full recompute on `schedule` (six-field cron, seconds
/// first, e.g. `0 */15 * * * *`).
async fn register_recompute_job(
    scheduler: &JobScheduler,
    schedule: &str,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let state = state.clone();

        Box::pin(async move {
            tracing::info!("scheduler: starting graph recompute");
            match recompute::recompute(&state).await {
                Ok(outcome) => tracing::info!(
                    users = outcome.plan.users,
                    edges_upserted = outcome.report.edges_upserted,
                    edges_retracted = outcome.report.edges_retracted,
                    "scheduler: graph recompute complete"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    retriable = e.is_retriable(),
                    "scheduler: graph recompute failed"
                ),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(schedule, "scheduler: registered graph recompute job");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_config;
    use simgraph_engine::InferenceEngine;
    use std::sync::Arc;

    fn state_with_cron(pool: sqlx::PgPool, cron: Option<&str>) -> AppState {
        let mut config = test_config(false);
        config.recompute_cron = cron.map(str::to_owned);
        AppState::new(pool, Arc::new(config), InferenceEngine::default())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn starts_without_a_schedule(pool: sqlx::PgPool) {
        let mut scheduler = build_scheduler(state_with_cron(pool, None))
            .await
            .expect("scheduler");
        scheduler.shutdown().await.expect("shutdown");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn registers_a_valid_schedule(pool: sqlx::PgPool) {
        let mut scheduler = build_scheduler(state_with_cron(pool, Some("0 */15 * * * *")))
            .await
            .expect("scheduler");
        scheduler.shutdown().await.expect("shutdown");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn rejects_an_invalid_schedule(pool: sqlx::PgPool) {
        let result = build_scheduler(state_with_cron(pool, Some("not a cron"))).await;
        assert!(result.is_err());
    }
}
