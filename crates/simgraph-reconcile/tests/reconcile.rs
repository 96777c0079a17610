//! End-to-end reconciliation against an in-memory store with injected faults.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use simgraph_core::{
    NodeUpsert, PostNode, ReconciliationPlan, SentimentLabel, SimilarityEdge, UserNode, UserPair,
};
use simgraph_reconcile::{
    plan_operations, ApplyState, CancellationFlag, GraphStore, MemoryGraphStore, PlanOperation,
    ReconcileError, Reconciler, RetryPolicy, RetryingStore, StoreError,
};

/// Wraps a [`MemoryGraphStore`] and fails store calls starting at call number
/// `fail_from` (1-based) until `failures_left` runs out.
struct FlakyStore {
    inner: MemoryGraphStore,
    calls: AtomicUsize,
    fail_from: usize,
    failures_left: AtomicU32,
    error: StoreError,
    cancel_after: Option<(usize, CancellationFlag)>,
}

impl FlakyStore {
    fn new(fail_from: usize, failures: u32, error: StoreError) -> Self {
        Self {
            inner: MemoryGraphStore::new(),
            calls: AtomicUsize::new(0),
            fail_from,
            failures_left: AtomicU32::new(failures),
            error,
            cancel_after: None,
        }
    }

    fn reliable() -> Self {
        Self::new(usize::MAX, 0, StoreError::Transient(String::new()))
    }

    fn heal(&self) {
        self.failures_left.store(0, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Result<(), StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, flag)) = &self.cancel_after {
            if call >= *after {
                flag.cancel();
            }
        }
        if call >= self.fail_from
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(self.error.clone());
        }
        Ok(())
    }
}

impl GraphStore for FlakyStore {
    async fn upsert_node(&self, node: &NodeUpsert) -> Result<(), StoreError> {
        self.gate()?;
        self.inner.upsert_node(node).await
    }

    async fn upsert_edge(&self, edge: &SimilarityEdge) -> Result<(), StoreError> {
        self.gate()?;
        self.inner.upsert_edge(edge).await
    }

    async fn delete_edge(&self, pair: &UserPair) -> Result<(), StoreError> {
        self.gate()?;
        self.inner.delete_edge(pair).await
    }
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base_ms: 0,
        max_delay_ms: 0,
    }
}

fn user(id: &str, sentiment: SentimentLabel) -> UserNode {
    UserNode {
        id: id.to_owned(),
        name: id.to_uppercase(),
        sentiment,
        post_count: 1,
    }
}

fn post(id: &str, author: &str, text: &str, sentiment: SentimentLabel) -> PostNode {
    PostNode {
        id: id.to_owned(),
        author_id: author.to_owned(),
        text: text.to_owned(),
        sentiment,
        score: 0.5,
    }
}

/// Five operations: two users, two posts, one edge.
fn five_op_plan() -> ReconciliationPlan {
    ReconciliationPlan {
        users: vec![
            user("a", SentimentLabel::Positive),
            user("b", SentimentLabel::Positive),
        ],
        posts: vec![
            post("1", "a", "love the new trail", SentimentLabel::Positive),
            post("2", "b", "love this trail", SentimentLabel::Positive),
        ],
        edges_upsert: vec![SimilarityEdge {
            pair: UserPair::new("a", "b"),
            score: 0.5,
            label: SentimentLabel::Positive,
            justification_posts: ("1".to_owned(), "2".to_owned()),
        }],
        edges_retract: vec![],
    }
}

async fn clean_apply(plan: &ReconciliationPlan) -> simgraph_reconcile::MemoryGraph {
    let reconciler = Reconciler::new(MemoryGraphStore::new());
    reconciler.reconcile(plan).await.unwrap();
    reconciler.store().snapshot().unwrap()
}

#[tokio::test]
async fn applying_a_plan_twice_equals_applying_it_once() {
    let plan = five_op_plan();
    let reconciler = Reconciler::new(MemoryGraphStore::new());

    let first = reconciler.reconcile(&plan).await.unwrap();
    let once = reconciler.store().snapshot().unwrap();
    let second = reconciler.reconcile(&plan).await.unwrap();
    let twice = reconciler.store().snapshot().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.applied(), 5);
    assert_eq!(once, twice);
}

#[tokio::test]
async fn transient_failure_is_retried_to_the_same_result() {
    let plan = five_op_plan();
    let reconciler = Reconciler::with_retry(
        FlakyStore::new(3, 1, StoreError::Transient("connection reset".to_owned())),
        fast_retry(3),
    );

    let report = reconciler.reconcile(&plan).await.unwrap();
    assert_eq!(report.applied(), 5);
    // 5 operations plus one retry of the third.
    assert_eq!(reconciler.store().inner().calls(), 6);

    let graph = reconciler.store().inner().inner.snapshot().unwrap();
    assert_eq!(graph, clean_apply(&plan).await);
}

#[tokio::test]
async fn exhausted_retries_report_the_unapplied_tail() {
    let plan = five_op_plan();
    let reconciler = Reconciler::with_retry(
        FlakyStore::new(3, u32::MAX, StoreError::Transient("timeout".to_owned())),
        fast_retry(2),
    );

    let err = reconciler.reconcile(&plan).await.unwrap_err();
    let ReconcileError::Partial {
        index, unapplied, ..
    } = &err
    else {
        panic!("expected Partial, got {err:?}");
    };
    assert_eq!(*index, 2);
    assert_eq!(unapplied, &plan_operations(&plan)[2..].to_vec());
    assert!(err.is_retriable());
    // Two successes, then one attempt plus two retries of the third.
    assert_eq!(reconciler.store().inner().calls(), 5);

    // Only the first two operations (both users) landed.
    let partial = reconciler.store().inner().inner.snapshot().unwrap();
    assert_eq!(partial.users.len(), 2);
    assert!(partial.posts.is_empty());

    // Resubmitting the tail once the store recovers completes the plan.
    reconciler.store().inner().heal();
    let report = reconciler
        .apply_operations(err.unapplied().to_vec(), &CancellationFlag::new())
        .await
        .unwrap();
    assert_eq!(report.applied(), 3);
    let healed = reconciler.store().inner().inner.snapshot().unwrap();
    assert_eq!(healed, clean_apply(&plan).await);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let plan = five_op_plan();
    let reconciler = Reconciler::with_retry(
        FlakyStore::new(4, 1, StoreError::Permanent("constraint violated".to_owned())),
        fast_retry(3),
    );

    let err = reconciler.reconcile(&plan).await.unwrap_err();
    match &err {
        ReconcileError::Permanent {
            index,
            operation,
            unapplied,
            ..
        } => {
            assert_eq!(*index, 3);
            assert_eq!(operation.to_string(), "upsert post 2");
            assert_eq!(unapplied.len(), 2);
        }
        other => panic!("expected Permanent, got {other:?}"),
    }
    assert!(!err.is_retriable());
    assert_eq!(reconciler.store().inner().calls(), 4);
}

#[tokio::test]
async fn store_rejection_surfaces_as_permanent() {
    let mut plan = five_op_plan();
    plan.edges_upsert[0].pair = UserPair::new("a", "ghost");

    let reconciler = Reconciler::new(MemoryGraphStore::new());
    let err = reconciler.reconcile(&plan).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Permanent { index: 4, .. }));
}

#[tokio::test]
async fn cancelling_before_start_applies_nothing() {
    let plan = five_op_plan();
    let reconciler = Reconciler::new(FlakyStore::reliable());
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = reconciler
        .reconcile_with_cancel(&plan, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Cancelled { ref unapplied } if unapplied.len() == 5));
    assert_eq!(reconciler.store().calls(), 0);
}

#[tokio::test]
async fn cancelling_mid_run_stops_at_the_next_operation() {
    let plan = five_op_plan();
    let cancel = CancellationFlag::new();
    let mut store = FlakyStore::reliable();
    store.cancel_after = Some((2, cancel.clone()));
    let reconciler = Reconciler::new(store);

    let err = reconciler
        .reconcile_with_cancel(&plan, &cancel)
        .await
        .unwrap_err();
    let unapplied = err.unapplied();
    assert_eq!(unapplied.len(), 3);
    assert!(matches!(
        unapplied[0],
        PlanOperation::UpsertNode(NodeUpsert::Post(_))
    ));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn retractions_remove_edges() {
    let reconciler = Reconciler::new(MemoryGraphStore::new());
    reconciler.reconcile(&five_op_plan()).await.unwrap();

    let retract = ReconciliationPlan {
        edges_retract: vec![UserPair::new("b", "a")],
        ..ReconciliationPlan::default()
    };
    let report = reconciler.reconcile(&retract).await.unwrap();
    assert_eq!(report.edges_retracted, 1);
    assert!(reconciler.store().snapshot().unwrap().edges.is_empty());

    // Retracting again is a no-op.
    reconciler.reconcile(&retract).await.unwrap();
}

#[tokio::test]
async fn concurrent_runs_do_not_interleave() {
    let plan = five_op_plan();
    let reconciler = std::sync::Arc::new(Reconciler::new(MemoryGraphStore::new()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let reconciler = std::sync::Arc::clone(&reconciler);
            let plan = plan.clone();
            tokio::spawn(async move { reconciler.reconcile(&plan).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        reconciler.store().snapshot().unwrap(),
        clean_apply(&plan).await
    );
}

#[tokio::test]
async fn retrying_store_can_wrap_any_store() {
    let store = RetryingStore::new(MemoryGraphStore::new(), RetryPolicy::no_retry());
    store
        .upsert_node(&NodeUpsert::User(user("solo", SentimentLabel::Neutral)))
        .await
        .unwrap();
    assert_eq!(store.inner().snapshot().unwrap().users.len(), 1);
}

/// Every store call takes `delay` before touching the inner store.
struct SlowStore {
    inner: MemoryGraphStore,
    delay: std::time::Duration,
}

impl GraphStore for SlowStore {
    async fn upsert_node(&self, node: &NodeUpsert) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert_node(node).await
    }

    async fn upsert_edge(&self, edge: &SimilarityEdge) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert_edge(edge).await
    }

    async fn delete_edge(&self, pair: &UserPair) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_edge(pair).await
    }
}

#[tokio::test]
async fn deadline_stops_the_run_between_operations() {
    let reconciler = Reconciler::new(SlowStore {
        inner: MemoryGraphStore::new(),
        delay: std::time::Duration::from_millis(100),
    });
    let deadline = std::time::Duration::from_millis(150);

    let err = reconciler
        .reconcile_with_deadline(&five_op_plan(), deadline)
        .await
        .unwrap_err();

    let ReconcileError::DeadlineExceeded {
        deadline: reported,
        unapplied,
    } = &err
    else {
        panic!("expected DeadlineExceeded, got {err:?}");
    };
    assert_eq!(*reported, deadline);
    // The second write finishes after the deadline; nothing after it starts.
    assert_eq!(unapplied.len(), 3);
    assert!(err.is_retriable());

    let graph = reconciler.store().inner.snapshot().unwrap();
    assert_eq!(graph.users.len(), 2);
    assert!(graph.posts.is_empty());
}

#[tokio::test]
async fn generous_deadline_applies_everything() {
    let reconciler = Reconciler::new(FlakyStore::reliable());
    let report = reconciler
        .reconcile_with_deadline(&five_op_plan(), std::time::Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(report.applied(), 5);
}

#[tokio::test]
async fn state_follows_the_run_lifecycle() {
    let reconciler = Reconciler::new(SlowStore {
        inner: MemoryGraphStore::new(),
        delay: std::time::Duration::from_millis(40),
    });
    assert_eq!(reconciler.state(), ApplyState::Pending);

    let plan = five_op_plan();
    let (result, during) = tokio::join!(reconciler.reconcile(&plan), async {
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        reconciler.state()
    });
    result.unwrap();
    assert_eq!(during, ApplyState::Applying);
    assert_eq!(reconciler.state(), ApplyState::Committed);
}

#[tokio::test]
async fn state_is_failed_after_a_stopped_run() {
    let store = FlakyStore::new(2, 1, StoreError::Permanent("rejected".to_owned()));
    let reconciler = Reconciler::new(store);
    reconciler.reconcile(&five_op_plan()).await.unwrap_err();
    assert_eq!(reconciler.state(), ApplyState::Failed);

    reconciler.store().heal();
    reconciler.reconcile(&five_op_plan()).await.unwrap();
    assert_eq!(reconciler.state(), ApplyState::Committed);
}
