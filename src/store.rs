//! Backing-store seams.
//!
//! Workers do not funnel results through the runner; each one writes into a
//! private connection to a shared store and commits when it stops. The store
//! itself is a collaborator: the engine only needs connections and a
//! capability answer, everything else (schema, transaction semantics,
//! durability) stays on the store's side of the boundary.
//!
//! Capability is an explicit object handed over by the store, not ambient
//! global state: the runner checks it once, before constructing any worker.

use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a store can do, answered once per run.
#[derive(Debug, Clone, Copy)]
pub struct StoreCapabilities {
    /// Whether the store supports many genuinely independent connections
    /// writing at the same time. Pooled runs are refused without this.
    pub concurrent_connections: bool,
}

/// One private connection, exclusively owned by one worker (or by the
/// single-threaded runner). Writes are buffered until `commit`.
pub trait StoreConnection<O>: Send + 'static {
    fn write(&mut self, output: O) -> anyhow::Result<()>;

    /// Flush everything written so far. Called exactly once, when the
    /// owning worker exits its loop.
    fn commit(&mut self) -> anyhow::Result<()>;
}

/// A shared backing store that hands out private connections.
pub trait ResultStore<O>: Send + Sync {
    type Connection: StoreConnection<O>;

    fn capabilities(&self) -> StoreCapabilities;

    fn connect(&self) -> anyhow::Result<Self::Connection>;
}

/// In-process reference store backed by a `Vec`.
///
/// Connections buffer writes locally and flush them under one lock on
/// commit, which models transactional stores closely enough for tests and
/// small embeddings. `single_connection()` builds a variant that reports no
/// concurrent-connection support, for exercising the capability check.
#[derive(Debug)]
pub struct MemoryStore<O> {
    rows: Arc<Mutex<Vec<O>>>,
    commits: Arc<AtomicUsize>,
    concurrent: bool,
}

impl<O> MemoryStore<O> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            commits: Arc::new(AtomicUsize::new(0)),
            concurrent: true,
        }
    }

    /// A store that refuses concurrent connections, like a single-file
    /// backend would.
    pub fn single_connection() -> Self {
        Self {
            concurrent: false,
            ..Self::new()
        }
    }

    /// How many connections have committed so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }
}

impl<O> Default for MemoryStore<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Clone> MemoryStore<O> {
    /// Snapshot of all committed rows, in commit order.
    pub fn rows(&self) -> Vec<O> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

impl<O: Send + 'static> ResultStore<O> for MemoryStore<O> {
    type Connection = MemoryConnection<O>;

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            concurrent_connections: self.concurrent,
        }
    }

    fn connect(&self) -> anyhow::Result<Self::Connection> {
        Ok(MemoryConnection {
            pending: Vec::new(),
            rows: Arc::clone(&self.rows),
            commits: Arc::clone(&self.commits),
        })
    }
}

/// Connection handed out by [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection<O> {
    pending: Vec<O>,
    rows: Arc<Mutex<Vec<O>>>,
    commits: Arc<AtomicUsize>,
}

impl<O: Send + 'static> StoreConnection<O> for MemoryConnection<O> {
    fn write(&mut self, output: O) -> anyhow::Result<()> {
        self.pending.push(output);
        Ok(())
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        rows.append(&mut self.pending);
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
