//! Retry with exponential back-off and jitter for graph store writes.
//!
//! [`retry_with_backoff`] wraps any fallible store call and retries on
//! [`StoreError::Transient`]. Permanent errors are returned immediately.
//! [`RetryingStore`] applies the same policy to every primitive of a wrapped
//! [`GraphStore`].

use std::future::Future;
use std::time::Duration;

use simgraph_core::config::{
    DEFAULT_STORE_BACKOFF_BASE_MS, DEFAULT_STORE_BACKOFF_MAX_MS, DEFAULT_STORE_MAX_RETRIES,
};
use simgraph_core::{AppConfig, NodeUpsert, SimilarityEdge, UserPair};

use crate::error::StoreError;
use crate::store::GraphStore;

/// How many extra attempts a transient failure gets, and how long to wait
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.store_max_retries,
            backoff_base_ms: config.store_backoff_base_ms,
            max_delay_ms: config.store_backoff_max_ms,
        }
    }

    /// Fail on the first error, transient or not.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Un-jittered delay before retry number `attempt` (1-based).
    ///
    /// With `backoff_base_ms = 200`: 200 ms, 400 ms, 800 ms, ... capped at
    /// `max_delay_ms`.
    #[must_use]
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(20);
        self.backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms)
    }

    /// Delay before retry number `attempt`, with ±25 % jitter applied.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.base_delay_ms(attempt);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_STORE_MAX_RETRIES,
            backoff_base_ms: DEFAULT_STORE_BACKOFF_BASE_MS,
            max_delay_ms: DEFAULT_STORE_BACKOFF_MAX_MS,
        }
    }
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient errors.
///
/// # Errors
///
/// Returns the first permanent error, or the last transient error once the
/// retry budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = policy.delay(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient store error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// A [`GraphStore`] that retries transient failures of the wrapped store.
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl<S: GraphStore> GraphStore for RetryingStore<S> {
    async fn upsert_node(&self, node: &NodeUpsert) -> Result<(), StoreError> {
        let inner = &self.inner;
        retry_with_backoff(self.policy, "upsert_node", move || inner.upsert_node(node)).await
    }

    async fn upsert_edge(&self, edge: &SimilarityEdge) -> Result<(), StoreError> {
        let inner = &self.inner;
        retry_with_backoff(self.policy, "upsert_edge", move || inner.upsert_edge(edge)).await
    }

    async fn delete_edge(&self, pair: &UserPair) -> Result<(), StoreError> {
        let inner = &self.inner;
        retry_with_backoff(self.policy, "delete_edge", move || inner.delete_edge(pair)).await
    }
}
