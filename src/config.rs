//! Runner configuration.
//!
//! `RunnerConfig` holds the per-runner defaults; `ApplyOptions` carries the
//! per-call overrides. Both are plain serde-derived structs so they can be
//! loaded from whatever configuration layer the embedding application uses.

use crate::args::CallArgs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the runner does when a transformation fails on one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run at the first failed task (default).
    #[default]
    Abort,
    /// Record the failure in the run report, count the task as seen, and
    /// keep going.
    Collect,
}

/// Per-runner defaults. Every field can be overridden per `apply` call where
/// it makes sense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Worker pool size. Anything below 2 selects single-threaded mode.
    pub parallelism: usize,

    /// Input-channel receive poll interval for idle workers, in
    /// milliseconds. Timeouts are silently retried; this bound only keeps
    /// the worker loop responsive to shutdown.
    pub poll_interval_ms: u64,

    /// What to do when one task fails.
    pub failure_policy: FailurePolicy,

    /// Whether to render a progress bar by default.
    pub progress: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            poll_interval_ms: 3_000,
            failure_policy: FailurePolicy::default(),
            progress: true,
        }
    }
}

impl RunnerConfig {
    /// Config with an explicit pool size.
    pub fn pooled(parallelism: usize) -> Self {
        Self {
            parallelism,
            ..Self::default()
        }
    }

    /// Config sized from the machine: 75% of available cores, uncapped.
    pub fn auto() -> Self {
        Self::pooled(recommended_parallelism(0, 75))
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Per-call options for [`Runner::apply`](crate::Runner::apply).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Invoke the invalidation hook before processing anything.
    pub clear: bool,

    /// Override the runner's pool size for this call.
    pub parallelism: Option<usize>,

    /// Override the runner's progress toggle for this call.
    pub progress: Option<bool>,

    /// Forwarded verbatim to every transform invocation and to the clear
    /// hook.
    pub args: CallArgs,
}

impl ApplyOptions {
    /// Defaults matching a fresh run: clear first, runner-level parallelism
    /// and progress, no extra arguments.
    pub fn new() -> Self {
        Self {
            clear: true,
            ..Self::default()
        }
    }

    pub fn without_clear(mut self) -> Self {
        self.clear = false;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_args(mut self, args: CallArgs) -> Self {
        self.args = args;
        self
    }
}

/// Calculate a pool size from available cores and user limits.
///
/// Applies `thread_percentage` to the detected core count, then caps the
/// result at `max_threads` when that is non-zero. Always returns at least 1.
pub fn recommended_parallelism(max_threads: usize, thread_percentage: u8) -> usize {
    let available_cores = num_cpus::get();

    let by_percentage = std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

    if max_threads > 0 {
        std::cmp::min(max_threads, by_percentage)
    } else {
        by_percentage
    }
}
