use std::time::Duration;

use thiserror::Error;

use crate::reconciler::PlanOperation;

/// Failure reported by a [`GraphStore`](crate::GraphStore) primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection reset, timeout, or similar. Safe to retry.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Malformed key, constraint violation, or similar. Retrying won't help.
    #[error("permanent store error: {0}")]
    Permanent(String),
}

impl StoreError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Why a plan application stopped before committing.
///
/// Every variant carries the operations that were not applied, starting with
/// the one that failed. All operations are idempotent, so callers may
/// resubmit them (or the whole plan) later.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("operation {index} ({operation}) failed permanently: {source}")]
    Permanent {
        index: usize,
        operation: PlanOperation,
        unapplied: Vec<PlanOperation>,
        #[source]
        source: StoreError,
    },

    #[error(
        "retries exhausted at operation {index}; {} operations unapplied: {source}",
        .unapplied.len()
    )]
    Partial {
        index: usize,
        unapplied: Vec<PlanOperation>,
        #[source]
        source: StoreError,
    },

    #[error("reconciliation cancelled; {} operations unapplied", .unapplied.len())]
    Cancelled { unapplied: Vec<PlanOperation> },

    #[error(
        "reconciliation exceeded its {deadline:?} deadline; {} operations unapplied",
        .unapplied.len()
    )]
    DeadlineExceeded {
        deadline: Duration,
        unapplied: Vec<PlanOperation>,
    },
}

impl ReconcileError {
    #[must_use]
    pub fn unapplied(&self) -> &[PlanOperation] {
        match self {
            ReconcileError::Permanent { unapplied, .. }
            | ReconcileError::Partial { unapplied, .. }
            | ReconcileError::Cancelled { unapplied }
            | ReconcileError::DeadlineExceeded { unapplied, .. } => unapplied,
        }
    }

    /// `true` when resubmitting the unapplied operations later may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(self, ReconcileError::Permanent { .. })
    }
}
