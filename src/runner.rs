//! Run orchestration.
//!
//! The runner owns a full run's lifecycle: invalidation hook, execution-mode
//! selection, worker pool construction, acknowledgment accounting, progress,
//! and the two-phase shutdown. Results never pass through the runner — each
//! worker persists its own outputs — so the control channel carries nothing
//! but completion signals and the termination decision is a pure count.

use crate::args::CallArgs;
use crate::config::{ApplyOptions, FailurePolicy, RunnerConfig};
use crate::error::{Error, Result};
use crate::feeder;
use crate::message::{Ack, Envelope};
use crate::progress::{ConsoleProgress, ProgressFactory, ProgressSink, SilentProgress};
use crate::store::{ResultStore, StoreConnection};
use crate::transform::{Transform, TransformFactory};
use crate::worker::Worker;
use crossbeam::channel::{unbounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

type InputOf<F> = <<F as TransformFactory>::Built as Transform>::Input;
type OutputOf<F> = <<F as TransformFactory>::Built as Transform>::Output;

/// One task that failed during a run with [`FailurePolicy::Collect`].
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub index: usize,
    pub worker: usize,
    pub message: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of input items.
    pub total: usize,
    /// Tasks that were applied and persisted without error.
    pub succeeded: usize,
    /// Per-task failures, empty unless the policy is `Collect`.
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies a transformation to a collection of items, sequentially or via a
/// fixed-size worker pool.
pub struct Runner<F, S> {
    factory: F,
    store: S,
    config: RunnerConfig,
    progress_factory: ProgressFactory,
}

impl<F, S> Runner<F, S>
where
    F: TransformFactory,
    S: ResultStore<OutputOf<F>>,
{
    pub fn new(factory: F, store: S, config: RunnerConfig) -> Self {
        Self {
            factory,
            store,
            config,
            progress_factory: Box::new(|total| Box::new(ConsoleProgress::new(total))),
        }
    }

    /// Replace the default progress bar with a custom sink per run.
    pub fn with_progress(
        mut self,
        factory: impl Fn(u64) -> Box<dyn ProgressSink> + Send + Sync + 'static,
    ) -> Self {
        self.progress_factory = Box::new(factory);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the transformation over `items`.
    ///
    /// Invokes the invalidation hook first when `opts.clear` is set, then
    /// picks the execution mode: single-threaded when the effective
    /// parallelism is below 2, pooled otherwise. Progress is tracked against
    /// the explicit total `items.len()`.
    pub fn apply(&self, items: Vec<InputOf<F>>, opts: ApplyOptions) -> Result<RunReport> {
        if opts.clear {
            debug!("invoking invalidation hook");
            self.factory.clear(&opts.args).map_err(Error::Transform)?;
        }

        let parallelism = opts.parallelism.unwrap_or(self.config.parallelism);
        let total = items.len();
        info!(total, parallelism, "starting run");

        let progress: Box<dyn ProgressSink> = if opts.progress.unwrap_or(self.config.progress) {
            (self.progress_factory)(total as u64)
        } else {
            Box::new(SilentProgress)
        };

        let outcome = if parallelism < 2 {
            self.apply_single_threaded(items, &opts.args, progress.as_ref())
        } else {
            self.apply_pooled(items, parallelism, &opts.args, progress.as_ref())
        };
        progress.finish();

        match &outcome {
            Ok(report) => {
                info!(
                    succeeded = report.succeeded,
                    failed = report.failures.len(),
                    "run complete"
                );
            }
            Err(e) => error!(error = %e, "run aborted"),
        }
        outcome
    }

    /// Sequential mode: one transform, one connection, items visited in
    /// collection order, a single commit at the end.
    fn apply_single_threaded(
        &self,
        items: Vec<InputOf<F>>,
        args: &CallArgs,
        progress: &dyn ProgressSink,
    ) -> Result<RunReport> {
        let total = items.len();
        let mut transform = self.factory.build(0).map_err(Error::Transform)?;
        let mut conn = self.store.connect().map_err(Error::Store)?;
        let mut failures = Vec::new();

        for (index, item) in items.iter().enumerate() {
            match transform.apply(item, args) {
                Ok(outputs) => {
                    for output in outputs {
                        conn.write(output).map_err(Error::Store)?;
                    }
                }
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        return Err(Error::Task {
                            index,
                            worker: 0,
                            message: format!("{e:#}"),
                        });
                    }
                    FailurePolicy::Collect => {
                        warn!(index, error = %format!("{e:#}"), "task failed, continuing");
                        failures.push(TaskFailure {
                            index,
                            worker: 0,
                            message: format!("{e:#}"),
                        });
                    }
                },
            }
            progress.inc();
        }

        conn.commit().map_err(Error::Store)?;
        Ok(RunReport {
            total,
            succeeded: total - failures.len(),
            failures,
        })
    }

    /// Pooled mode: `parallelism` workers pull from one shared input
    /// channel, persist through private connections, and acknowledge each
    /// task on the control channel. The runner drains acknowledgments until
    /// the count matches the input size, then relays one shutdown token
    /// through the pool and joins everything.
    fn apply_pooled(
        &self,
        items: Vec<InputOf<F>>,
        parallelism: usize,
        args: &CallArgs,
        progress: &dyn ProgressSink,
    ) -> Result<RunReport> {
        if !self.store.capabilities().concurrent_connections {
            return Err(Error::Config(
                "pooled mode requires a store with concurrent connection support; \
                 use parallelism = 1 or switch backends"
                    .into(),
            ));
        }

        let total = items.len();
        let (input_tx, input_rx) = unbounded::<Envelope<InputOf<F>>>();
        let (control_tx, control_rx) = unbounded::<Ack>();
        let shutdown = Arc::new(AtomicBool::new(false));

        // Construct workers on this thread so connection and build failures
        // surface before any task is processed.
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(parallelism);
        for worker_id in 0..parallelism {
            let transform = match self.factory.build(worker_id).map_err(Error::Transform) {
                Ok(transform) => transform,
                Err(e) => {
                    abort_pool(&input_tx, &shutdown, handles, None);
                    return Err(e);
                }
            };
            let conn = match self.store.connect().map_err(Error::Store) {
                Ok(conn) => conn,
                Err(e) => {
                    abort_pool(&input_tx, &shutdown, handles, None);
                    return Err(e);
                }
            };

            let worker = Worker {
                id: worker_id,
                transform,
                conn,
                input_tx: input_tx.clone(),
                input_rx: input_rx.clone(),
                control_tx: control_tx.clone(),
                poll_interval: self.config.poll_interval(),
                shutdown: Arc::clone(&shutdown),
                args: args.clone(),
            };
            match worker.spawn() {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abort_pool(&input_tx, &shutdown, handles, None);
                    return Err(e);
                }
            }
        }

        // Only workers may hold control senders: when every worker is gone,
        // the drain loop observes a disconnect instead of waiting forever.
        drop(control_tx);

        let feeder = match feeder::spawn(items, input_tx.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                abort_pool(&input_tx, &shutdown, handles, None);
                return Err(e);
            }
        };

        let mut seen = 0usize;
        let mut failures = Vec::new();
        while seen < total {
            match control_rx.recv() {
                Ok(Ack::TaskDone) => {
                    seen += 1;
                    progress.inc();
                }
                Ok(Ack::TaskFailed {
                    worker,
                    index,
                    message,
                }) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        error!(worker, index, "task failed, aborting run");
                        abort_pool(&input_tx, &shutdown, handles, Some(feeder));
                        return Err(Error::Task {
                            index,
                            worker,
                            message,
                        });
                    }
                    FailurePolicy::Collect => {
                        warn!(worker, index, message = %message, "task failed, continuing");
                        failures.push(TaskFailure {
                            index,
                            worker,
                            message,
                        });
                        seen += 1;
                        progress.inc();
                    }
                },
                Err(_) => {
                    abort_pool(&input_tx, &shutdown, handles, Some(feeder));
                    return Err(Error::Protocol(format!(
                        "control channel closed after {seen} of {total} acknowledgments"
                    )));
                }
            }
        }

        // Every task is acknowledged, so the feeder has nothing left to
        // enqueue; join it before shutdown begins.
        if feeder.join().is_err() {
            warn!("feeder thread panicked");
        }

        // Two-phase shutdown: one token, relayed worker to worker until the
        // whole pool has observed it.
        debug!("pushing shutdown token");
        if input_tx.send(Envelope::Shutdown).is_err() {
            return Err(Error::Protocol(
                "input channel closed before shutdown".into(),
            ));
        }

        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }

        Ok(RunReport {
            total,
            succeeded: total - failures.len(),
            failures,
        })
    }
}

/// Abnormal teardown: raise the shutdown flag (the forced-exit safety net),
/// push a token for workers already blocked on the channel, and join
/// whatever was started. Workers commit their private connections on the way
/// out as usual.
fn abort_pool<T>(
    input_tx: &Sender<Envelope<T>>,
    shutdown: &AtomicBool,
    handles: Vec<JoinHandle<()>>,
    feeder: Option<JoinHandle<()>>,
) {
    shutdown.store(true, Ordering::Relaxed);
    let _ = input_tx.send(Envelope::Shutdown);
    if let Some(handle) = feeder {
        let _ = handle.join();
    }
    for handle in handles {
        let _ = handle.join();
    }
}
