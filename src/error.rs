//! Error taxonomy for the execution engine.
//!
//! The engine distinguishes caller-facing failure classes (configuration,
//! protocol, task, store) while keeping collaborator errors opaque: whatever
//! a transform or store returns is carried along as an `anyhow::Error`
//! source rather than being reinterpreted here.

use thiserror::Error;

/// Errors surfaced by a run.
#[derive(Debug, Error)]
pub enum Error {
    /// The run was misconfigured and never started (e.g. pooled mode against
    /// a store that cannot open concurrent connections).
    #[error("configuration error: {0}")]
    Config(String),

    /// The control channel broke its contract, e.g. it disconnected before
    /// every expected acknowledgment arrived. Fatal to the run.
    #[error("control protocol violation: {0}")]
    Protocol(String),

    /// A transformation failed on one task and the failure policy is to
    /// abort the run.
    #[error("task {index} failed on worker {worker}: {message}")]
    Task {
        index: usize,
        worker: usize,
        message: String,
    },

    /// The backing store rejected a connection, write, or commit.
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// Building a transform or running the clear hook failed.
    #[error("transform error: {0:#}")]
    Transform(#[source] anyhow::Error),

    /// The operating system refused to spawn a thread.
    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
