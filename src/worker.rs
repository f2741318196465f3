//! The worker state machine.
//!
//! A worker loops Idle → Busy → Idle until it observes the shutdown token,
//! then stops. Each worker exclusively owns one transform instance and one
//! store connection; outputs go straight into the connection and exactly one
//! acknowledgment per pulled task goes onto the control channel. On exit the
//! connection is committed, then released.
//!
//! Shutdown is a relay: the runner pushes a single token, and every worker
//! that consumes it pushes it back before stopping, so the token visits all
//! workers regardless of scheduling order. The shared shutdown flag is a
//! safety net for abnormal teardown; combined with the bounded receive
//! timeout it guarantees a worker exits within one poll interval even if the
//! token never reaches it.

use crate::args::CallArgs;
use crate::error::{Error, Result};
use crate::message::{Ack, Envelope, Task};
use crate::store::StoreConnection;
use crate::transform::Transform;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Busy,
    Stopped,
}

/// One worker of a pooled run. Constructed on the runner thread (so
/// connection failures surface before anything starts), then moved into its
/// own named thread.
pub(crate) struct Worker<X, C>
where
    X: Transform,
    C: StoreConnection<X::Output>,
{
    pub(crate) id: usize,
    pub(crate) transform: X,
    pub(crate) conn: C,
    pub(crate) input_tx: Sender<Envelope<X::Input>>,
    pub(crate) input_rx: Receiver<Envelope<X::Input>>,
    pub(crate) control_tx: Sender<Ack>,
    pub(crate) poll_interval: Duration,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) args: CallArgs,
}

impl<X, C> Worker<X, C>
where
    X: Transform,
    C: StoreConnection<X::Output>,
{
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("taskmill-worker-{}", self.id))
            .spawn(move || self.run())
            .map_err(|source| Error::Spawn {
                name: "worker",
                source,
            })
    }

    fn run(mut self) {
        let mut state = WorkerState::Idle;
        debug!(worker = self.id, state = ?state, "worker started");

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!(worker = self.id, "shutdown flag set, stopping");
                state = WorkerState::Stopped;
                break;
            }

            match self.input_rx.recv_timeout(self.poll_interval) {
                Ok(Envelope::Task(task)) => {
                    state = WorkerState::Busy;
                    trace!(worker = self.id, index = task.index, state = ?state, "task received");
                    self.handle(task);
                    state = WorkerState::Idle;
                    trace!(worker = self.id, state = ?state, "task complete");
                }
                Ok(Envelope::Shutdown) => {
                    // Relay the token so a sibling worker also observes it.
                    let _ = self.input_tx.send(Envelope::Shutdown);
                    state = WorkerState::Stopped;
                    break;
                }
                // An empty channel within the poll interval is not an error.
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(worker = self.id, "input channel disconnected, stopping");
                    state = WorkerState::Stopped;
                    break;
                }
            }
        }

        // Commit, then release, the private connection.
        if let Err(e) = self.conn.commit() {
            error!(worker = self.id, error = %format!("{e:#}"), "commit failed on worker exit");
        }
        debug!(worker = self.id, state = ?state, "worker stopped");
    }

    fn handle(&mut self, task: Task<X::Input>) {
        let ack = match self.transform.apply(&task.item, &self.args) {
            Ok(outputs) => self.persist(task.index, outputs),
            Err(e) => Ack::TaskFailed {
                worker: self.id,
                index: task.index,
                message: format!("{e:#}"),
            },
        };

        if self.control_tx.send(ack).is_err() {
            warn!(worker = self.id, "control channel closed, acknowledgment dropped");
        }
    }

    fn persist(&mut self, index: usize, outputs: Vec<X::Output>) -> Ack {
        for output in outputs {
            if let Err(e) = self.conn.write(output) {
                return Ack::TaskFailed {
                    worker: self.id,
                    index,
                    message: format!("store write failed: {e:#}"),
                };
            }
        }
        Ack::TaskDone
    }
}
