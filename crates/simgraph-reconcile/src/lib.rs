//! Applies inference plans to a graph store.
//!
//! [`GraphStore`] is the seam to persistence: three idempotent primitives
//! keyed by stable identifiers. [`RetryingStore`] decorates any store with
//! exponential back-off on transient failures, and [`Reconciler`] walks a
//! plan's operations in order, reporting exactly which operations remain
//! unapplied when it stops early.

pub mod error;
pub mod memory;
pub mod reconciler;
pub mod retry;
pub mod store;

pub use error::{ReconcileError, StoreError};
pub use memory::{MemoryGraph, MemoryGraphStore};
pub use reconciler::{
    plan_operations, ApplyState, CancellationFlag, PlanOperation, ReconcileReport, Reconciler,
};
pub use retry::{retry_with_backoff, RetryPolicy, RetryingStore};
pub use store::GraphStore;
