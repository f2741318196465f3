//! Integration tests for the taskmill runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskmill::{
    ApplyOptions, CallArgs, Error, FailurePolicy, MemoryStore, ProgressSink, Runner, RunnerConfig,
    Transform, TransformFactory,
};

/// Multiplies each item by the pass-through `factor` argument (default 2),
/// failing on one designated item when asked to.
struct Scale {
    fail_on: Option<i64>,
}

impl Transform for Scale {
    type Input = i64;
    type Output = i64;

    fn apply(&mut self, item: &i64, args: &CallArgs) -> anyhow::Result<Vec<i64>> {
        if self.fail_on == Some(*item) {
            anyhow::bail!("refusing item {item}");
        }
        let factor = args.get_i64("factor").unwrap_or(2);
        Ok(vec![item * factor])
    }
}

/// Factory that counts how often it builds transforms and runs the clear
/// hook.
#[derive(Default)]
struct ScaleFactory {
    builds: Arc<AtomicUsize>,
    clears: Arc<AtomicUsize>,
    fail_on: Option<i64>,
}

impl TransformFactory for ScaleFactory {
    type Built = Scale;

    fn build(&self, _worker: usize) -> anyhow::Result<Scale> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        Ok(Scale {
            fail_on: self.fail_on,
        })
    }

    fn clear(&self, _args: &CallArgs) -> anyhow::Result<()> {
        self.clears.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Progress sink that just counts increments and finishes.
struct CountingSink {
    incs: Arc<AtomicUsize>,
    finishes: Arc<AtomicUsize>,
}

impl ProgressSink for CountingSink {
    fn inc(&self) {
        self.incs.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.finishes.fetch_add(1, Ordering::Relaxed);
    }
}

struct Counters {
    incs: Arc<AtomicUsize>,
    finishes: Arc<AtomicUsize>,
}

fn counting_runner(
    factory: ScaleFactory,
    store: MemoryStore<i64>,
    config: RunnerConfig,
) -> (Runner<ScaleFactory, MemoryStore<i64>>, Counters) {
    let incs = Arc::new(AtomicUsize::new(0));
    let finishes = Arc::new(AtomicUsize::new(0));
    let counters = Counters {
        incs: Arc::clone(&incs),
        finishes: Arc::clone(&finishes),
    };
    let runner = Runner::new(factory, store, config).with_progress(move |_total| {
        Box::new(CountingSink {
            incs: Arc::clone(&incs),
            finishes: Arc::clone(&finishes),
        })
    });
    (runner, counters)
}

fn fast_config(parallelism: usize) -> RunnerConfig {
    RunnerConfig {
        poll_interval_ms: 50,
        ..RunnerConfig::pooled(parallelism)
    }
}

#[test]
fn sequential_run_preserves_input_order() {
    let factory = ScaleFactory::default();
    let builds = Arc::clone(&factory.builds);
    let (runner, counters) = counting_runner(factory, MemoryStore::new(), fast_config(1));

    let report = runner.apply((0..10).collect(), ApplyOptions::new()).unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.succeeded, 10);
    assert!(report.is_clean());

    // One transform instance, one connection, one commit, ordered output.
    assert_eq!(builds.load(Ordering::Relaxed), 1);
    assert_eq!(runner.store().commit_count(), 1);
    assert_eq!(runner.store().rows(), (0..10).map(|x| x * 2).collect::<Vec<_>>());

    assert_eq!(counters.incs.load(Ordering::Relaxed), 10);
    assert_eq!(counters.finishes.load(Ordering::Relaxed), 1);
}

#[test]
fn pooled_run_counts_every_acknowledgment() {
    let factory = ScaleFactory::default();
    let builds = Arc::clone(&factory.builds);
    let (runner, counters) = counting_runner(factory, MemoryStore::new(), fast_config(3));

    let report = runner.apply((0..10).collect(), ApplyOptions::new()).unwrap();

    assert_eq!(report.succeeded, 10);

    // Three workers, each built and committed exactly once.
    assert_eq!(builds.load(Ordering::Relaxed), 3);
    assert_eq!(runner.store().commit_count(), 3);

    // No ordering guarantee across workers, only the count invariant.
    let mut rows = runner.store().rows();
    rows.sort_unstable();
    assert_eq!(rows, (0..10).map(|x| x * 2).collect::<Vec<_>>());

    assert_eq!(counters.incs.load(Ordering::Relaxed), 10);
}

#[test]
fn empty_input_terminates_without_deadlock() {
    let factory = ScaleFactory::default();
    let (runner, counters) = counting_runner(factory, MemoryStore::new(), fast_config(4));

    let report = runner.apply(Vec::new(), ApplyOptions::new()).unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.succeeded, 0);

    // All four workers started, saw the relayed token, and committed on the
    // way out; progress never moved.
    assert_eq!(runner.store().commit_count(), 4);
    assert!(runner.store().rows().is_empty());
    assert_eq!(counters.incs.load(Ordering::Relaxed), 0);
}

#[test]
fn pooled_rejects_single_connection_store() {
    let factory = ScaleFactory::default();
    let builds = Arc::clone(&factory.builds);
    let runner = Runner::new(
        factory,
        MemoryStore::single_connection(),
        fast_config(2),
    );

    let err = runner
        .apply(vec![1, 2, 3], ApplyOptions::new().with_progress(false))
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)), "got {err:?}");
    // Rejected before any worker was constructed.
    assert_eq!(builds.load(Ordering::Relaxed), 0);
}

#[test]
fn single_connection_store_is_fine_single_threaded() {
    let factory = ScaleFactory::default();
    let runner = Runner::new(
        factory,
        MemoryStore::single_connection(),
        fast_config(1),
    );

    let report = runner
        .apply(vec![1, 2, 3], ApplyOptions::new().with_progress(false))
        .unwrap();
    assert_eq!(report.succeeded, 3);
}

#[test]
fn failed_task_aborts_the_run_by_default() {
    let factory = ScaleFactory {
        fail_on: Some(5),
        ..ScaleFactory::default()
    };
    let (runner, _counters) = counting_runner(factory, MemoryStore::new(), fast_config(2));

    let err = runner.apply((0..10).collect(), ApplyOptions::new()).unwrap_err();

    match err {
        Error::Task { index, message, .. } => {
            assert_eq!(index, 5);
            assert!(message.contains("refusing item 5"));
        }
        other => panic!("expected Error::Task, got {other:?}"),
    }

    // Both workers were joined during the abort and committed whatever they
    // had already written.
    assert_eq!(runner.store().commit_count(), 2);
}

#[test]
fn collect_policy_isolates_failures() {
    let factory = ScaleFactory {
        fail_on: Some(5),
        ..ScaleFactory::default()
    };
    let config = RunnerConfig {
        failure_policy: FailurePolicy::Collect,
        ..fast_config(3)
    };
    let (runner, counters) = counting_runner(factory, MemoryStore::new(), config);

    let report = runner.apply((0..10).collect(), ApplyOptions::new()).unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.succeeded, 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 5);

    // The failed task still counted toward completion.
    assert_eq!(counters.incs.load(Ordering::Relaxed), 10);
    assert_eq!(runner.store().rows().len(), 9);
}

#[test]
fn collect_policy_works_single_threaded() {
    let factory = ScaleFactory {
        fail_on: Some(2),
        ..ScaleFactory::default()
    };
    let config = RunnerConfig {
        failure_policy: FailurePolicy::Collect,
        ..fast_config(1)
    };
    let (runner, _counters) = counting_runner(factory, MemoryStore::new(), config);

    let report = runner.apply((0..5).collect(), ApplyOptions::new()).unwrap();

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(runner.store().rows(), vec![0, 2, 6, 8]);
}

#[test]
fn clear_hook_runs_once_when_requested() {
    let factory = ScaleFactory::default();
    let clears = Arc::clone(&factory.clears);
    let (runner, _counters) = counting_runner(factory, MemoryStore::new(), fast_config(1));

    runner.apply(vec![1], ApplyOptions::new()).unwrap();
    assert_eq!(clears.load(Ordering::Relaxed), 1);

    runner
        .apply(vec![1], ApplyOptions::new().without_clear())
        .unwrap();
    assert_eq!(clears.load(Ordering::Relaxed), 1);
}

#[test]
fn call_args_reach_every_invocation() {
    let args = CallArgs::new().set("factor", 10);

    for parallelism in [1, 3] {
        let factory = ScaleFactory::default();
        let (runner, _counters) =
            counting_runner(factory, MemoryStore::new(), fast_config(parallelism));

        runner
            .apply(
                (0..6).collect(),
                ApplyOptions::new().with_args(args.clone()),
            )
            .unwrap();

        let mut rows = runner.store().rows();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 10, 20, 30, 40, 50]);
    }
}

#[test]
fn parallelism_override_selects_pooled_mode() {
    let factory = ScaleFactory::default();
    let builds = Arc::clone(&factory.builds);
    let (runner, _counters) = counting_runner(factory, MemoryStore::new(), fast_config(1));

    runner
        .apply(
            (0..8).collect(),
            ApplyOptions::new().with_parallelism(4),
        )
        .unwrap();

    assert_eq!(builds.load(Ordering::Relaxed), 4);
    assert_eq!(runner.store().commit_count(), 4);
}

#[test]
fn dead_workers_surface_as_protocol_violation() {
    struct Panicking;

    impl Transform for Panicking {
        type Input = i64;
        type Output = i64;

        fn apply(&mut self, _item: &i64, _args: &CallArgs) -> anyhow::Result<Vec<i64>> {
            panic!("worker down");
        }
    }

    struct PanickingFactory;

    impl TransformFactory for PanickingFactory {
        type Built = Panicking;

        fn build(&self, _worker: usize) -> anyhow::Result<Panicking> {
            Ok(Panicking)
        }

        fn clear(&self, _args: &CallArgs) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let runner = Runner::new(PanickingFactory, MemoryStore::new(), fast_config(2));

    let err = runner
        .apply(vec![1, 2, 3, 4], ApplyOptions::new().with_progress(false))
        .unwrap_err();

    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
}
