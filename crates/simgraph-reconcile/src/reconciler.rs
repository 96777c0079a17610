//! Ordered, resumable application of a [`ReconciliationPlan`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::Serialize;
use simgraph_core::{NodeUpsert, ReconciliationPlan, SimilarityEdge, UserPair};
use tokio::sync::Mutex;

use crate::error::{ReconcileError, StoreError};
use crate::retry::{RetryPolicy, RetryingStore};
use crate::store::GraphStore;

/// One store write derived from a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOperation {
    UpsertNode(NodeUpsert),
    UpsertEdge(SimilarityEdge),
    DeleteEdge(UserPair),
}

impl fmt::Display for PlanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOperation::UpsertNode(NodeUpsert::User(user)) => {
                write!(f, "upsert user {}", user.id)
            }
            PlanOperation::UpsertNode(NodeUpsert::Post(post)) => {
                write!(f, "upsert post {}", post.id)
            }
            PlanOperation::UpsertEdge(edge) => write!(f, "upsert edge {}", edge.pair),
            PlanOperation::DeleteEdge(pair) => write!(f, "delete edge {pair}"),
        }
    }
}

/// Flattens a plan into the order it is applied in: users, posts, edge
/// upserts, then edge retractions. Nodes precede the edges that reference
/// them.
#[must_use]
pub fn plan_operations(plan: &ReconciliationPlan) -> Vec<PlanOperation> {
    let mut ops = Vec::with_capacity(plan.operation_count());
    ops.extend(
        plan.users
            .iter()
            .cloned()
            .map(|u| PlanOperation::UpsertNode(NodeUpsert::User(u))),
    );
    ops.extend(
        plan.posts
            .iter()
            .cloned()
            .map(|p| PlanOperation::UpsertNode(NodeUpsert::Post(p))),
    );
    ops.extend(plan.edges_upsert.iter().cloned().map(PlanOperation::UpsertEdge));
    ops.extend(plan.edges_retract.iter().cloned().map(PlanOperation::DeleteEdge));
    ops
}

/// Lifecycle of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    Pending,
    Applying,
    Committed,
    Failed,
}

/// Cooperative cancellation signal checked between operations.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a committed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub users_upserted: usize,
    pub posts_upserted: usize,
    pub edges_upserted: usize,
    pub edges_retracted: usize,
}

impl ReconcileReport {
    #[must_use]
    pub fn applied(&self) -> usize {
        self.users_upserted + self.posts_upserted + self.edges_upserted + self.edges_retracted
    }

    fn record(&mut self, op: &PlanOperation) {
        match op {
            PlanOperation::UpsertNode(NodeUpsert::User(_)) => self.users_upserted += 1,
            PlanOperation::UpsertNode(NodeUpsert::Post(_)) => self.posts_upserted += 1,
            PlanOperation::UpsertEdge(_) => self.edges_upserted += 1,
            PlanOperation::DeleteEdge(_) => self.edges_retracted += 1,
        }
    }
}

/// Applies plans to a [`GraphStore`], one run at a time.
///
/// Concurrent callers are serialized on an internal lock, so runs never
/// interleave their writes. A run stops at the first failing operation; the
/// returned [`ReconcileError`] lists that operation and every one after it.
#[derive(Debug)]
pub struct Reconciler<S> {
    store: S,
    run_lock: Mutex<()>,
    /// State of the current run, or of the last one once it has finished.
    state: std::sync::Mutex<ApplyState>,
}

impl<S> Reconciler<RetryingStore<S>>
where
    S: GraphStore,
{
    /// Reconciler whose store retries transient failures per `policy`.
    pub fn with_retry(store: S, policy: RetryPolicy) -> Self {
        Self::new(RetryingStore::new(store, policy))
    }
}

impl<S: GraphStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            run_lock: Mutex::new(()),
            state: std::sync::Mutex::new(ApplyState::Pending),
        }
    }

    /// Lifecycle state of the running or most recent run. `Pending` until the
    /// first run starts.
    #[must_use]
    pub fn state(&self) -> ApplyState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: ApplyState, operations: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = ?*state, to = ?next, operations, "reconcile state change");
        *state = next;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply every operation of `plan`.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::apply_operations`].
    pub async fn reconcile(
        &self,
        plan: &ReconciliationPlan,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.reconcile_with_cancel(plan, &CancellationFlag::new())
            .await
    }

    /// Apply `plan`, stopping before the next operation once `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::apply_operations`].
    pub async fn reconcile_with_cancel(
        &self,
        plan: &ReconciliationPlan,
        cancel: &CancellationFlag,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.apply_operations(plan_operations(plan), cancel).await
    }

    /// Apply `plan`, giving up once `deadline` has passed.
    ///
    /// The operation in flight when the deadline passes is allowed to finish;
    /// the run then stops at the next operation boundary.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::DeadlineExceeded`] when the deadline cut the run
    /// short, otherwise as [`Reconciler::apply_operations`].
    pub async fn reconcile_with_deadline(
        &self,
        plan: &ReconciliationPlan,
        deadline: Duration,
    ) -> Result<ReconcileReport, ReconcileError> {
        let cancel = CancellationFlag::new();
        let run = self.reconcile_with_cancel(plan, &cancel);
        tokio::pin!(run);

        match tokio::time::timeout(deadline, run.as_mut()).await {
            Ok(result) => result,
            Err(_elapsed) => {
                cancel.cancel();
                tracing::warn!(?deadline, "reconciliation deadline passed, stopping");
                match run.await {
                    Err(ReconcileError::Cancelled { unapplied }) => {
                        Err(ReconcileError::DeadlineExceeded {
                            deadline,
                            unapplied,
                        })
                    }
                    other => other,
                }
            }
        }
    }

    /// Apply `operations` in order. Used directly to resubmit the unapplied
    /// tail of a failed run.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Permanent`] when the store rejects an operation
    ///   outright.
    /// - [`ReconcileError::Partial`] when an operation is still failing
    ///   transiently after the store gave up retrying.
    /// - [`ReconcileError::Cancelled`] when `cancel` fired mid-run.
    ///
    /// The run lock is taken before the first operation, so a run queued
    /// behind another can still be cancelled before it writes anything.
    pub async fn apply_operations(
        &self,
        operations: Vec<PlanOperation>,
        cancel: &CancellationFlag,
    ) -> Result<ReconcileReport, ReconcileError> {
        let _run = self.run_lock.lock().await;
        let total = operations.len();
        let mut report = ReconcileReport::default();

        self.transition(ApplyState::Applying, total);
        for (index, op) in operations.iter().enumerate() {
            if cancel.is_cancelled() {
                self.transition(ApplyState::Failed, total);
                tracing::warn!(index, remaining = total - index, "reconciliation cancelled");
                return Err(ReconcileError::Cancelled {
                    unapplied: operations[index..].to_vec(),
                });
            }

            if let Err(source) = apply_one(&self.store, op).await {
                self.transition(ApplyState::Failed, total);
                tracing::error!(
                    index,
                    operation = %op,
                    remaining = total - index,
                    error = %source,
                    "reconciliation stopped"
                );
                let unapplied = operations[index..].to_vec();
                return Err(if source.is_transient() {
                    ReconcileError::Partial {
                        index,
                        unapplied,
                        source,
                    }
                } else {
                    ReconcileError::Permanent {
                        index,
                        operation: op.clone(),
                        unapplied,
                        source,
                    }
                });
            }
            report.record(op);
        }
        self.transition(ApplyState::Committed, total);

        tracing::info!(
            users = report.users_upserted,
            posts = report.posts_upserted,
            edges_upserted = report.edges_upserted,
            edges_retracted = report.edges_retracted,
            "reconciliation committed"
        );
        Ok(report)
    }
}

async fn apply_one<S: GraphStore>(store: &S, op: &PlanOperation) -> Result<(), StoreError> {
    match op {
        PlanOperation::UpsertNode(node) => store.upsert_node(node).await,
        PlanOperation::UpsertEdge(edge) => store.upsert_edge(edge).await,
        PlanOperation::DeleteEdge(pair) => store.delete_edge(pair).await,
    }
}
