//! # Taskmill - Parallel Task Execution with Private Store Connections
//!
//! A generic engine that applies a user-supplied transformation to each item
//! of a collection, either sequentially on the calling thread or via a
//! fixed-size pool of worker threads.
//!
//! ## Design
//!
//! - **No central results funnel**: every worker owns a private connection
//!   to the shared backing store and writes its outputs directly; the
//!   control channel carries only completion signals.
//! - **Count-based termination**: the runner counts acknowledgments until
//!   they match the input size. No ordering is assumed between workers.
//! - **Relay shutdown**: one shutdown token is pushed after all tasks are
//!   acknowledged; each worker that observes it re-pushes it before
//!   stopping, so the single token reaches the whole pool.
//! - **Explicit seams**: the transformation ([`Transform`] /
//!   [`TransformFactory`]), the backing store ([`ResultStore`]), and the
//!   progress display ([`ProgressSink`]) are all collaborator traits.
//!
//! ## Quick start
//!
//! ```no_run
//! use taskmill::{
//!     ApplyOptions, CallArgs, MemoryStore, Runner, RunnerConfig, Transform, TransformFactory,
//! };
//!
//! struct Double;
//!
//! impl Transform for Double {
//!     type Input = i64;
//!     type Output = i64;
//!
//!     fn apply(&mut self, item: &i64, _args: &CallArgs) -> anyhow::Result<Vec<i64>> {
//!         Ok(vec![item * 2])
//!     }
//! }
//!
//! struct DoubleFactory;
//!
//! impl TransformFactory for DoubleFactory {
//!     type Built = Double;
//!
//!     fn build(&self, _worker: usize) -> anyhow::Result<Double> {
//!         Ok(Double)
//!     }
//!
//!     fn clear(&self, _args: &CallArgs) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> taskmill::Result<()> {
//! let runner = Runner::new(DoubleFactory, MemoryStore::new(), RunnerConfig::pooled(4));
//! let report = runner.apply((0..100).collect(), ApplyOptions::new())?;
//! assert_eq!(report.succeeded, 100);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod config;
pub mod error;
pub mod message;
pub mod progress;
pub mod runner;
pub mod store;
pub mod transform;

mod feeder;
mod worker;

pub use args::CallArgs;
pub use config::{recommended_parallelism, ApplyOptions, FailurePolicy, RunnerConfig};
pub use error::{Error, Result};
pub use message::{Ack, Envelope, Task};
pub use progress::{ConsoleProgress, ProgressSink, SilentProgress};
pub use runner::{RunReport, Runner, TaskFailure};
pub use store::{MemoryStore, ResultStore, StoreCapabilities, StoreConnection};
pub use transform::{Transform, TransformFactory};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
