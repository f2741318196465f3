//! The transformation seams.
//!
//! The engine never interprets what a transformation does; it only needs two
//! things from the embedding application: a way to build one transform
//! instance per worker, and a way to invalidate downstream artifacts of a
//! prior run. Both live here as traits. A missing implementation is a
//! compile error, so the "unimplemented contract" failure class of the
//! original design is discharged before the program ever runs.

use crate::args::CallArgs;

/// A transformation applied to one input item at a time.
///
/// Each worker owns exactly one instance, so `apply` takes `&mut self` and
/// may keep per-worker scratch state. It must not touch shared mutable state
/// outside the worker's own store connection.
pub trait Transform: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Produce zero or more outputs from one input item.
    fn apply(&mut self, item: &Self::Input, args: &CallArgs) -> anyhow::Result<Vec<Self::Output>>;
}

/// Builds transforms and owns the invalidation hook.
///
/// The runner calls `build` once per worker at the start of a pooled run
/// (or once total in single-threaded mode) and `clear` at most once per
/// `apply` call, before any task is processed.
pub trait TransformFactory: Send + Sync {
    type Built: Transform;

    /// Construct the transform instance for one worker. The worker id is
    /// diagnostic only; tasks are never routed by it.
    fn build(&self, worker: usize) -> anyhow::Result<Self::Built>;

    /// Invalidate whatever a previous run produced downstream.
    fn clear(&self, args: &CallArgs) -> anyhow::Result<()>;
}
