//! The feeder thread.
//!
//! Enumerates the input collection and pushes one positionally tagged task
//! per item onto the input channel. It runs as its own thread so slow
//! enumeration never blocks worker startup, and since the channel is
//! unbounded, fast enumeration never blocks on worker availability.

use crate::error::{Error, Result};
use crate::message::{Envelope, Task};
use crossbeam::channel::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub(crate) fn spawn<T: Send + 'static>(
    items: Vec<T>,
    input_tx: Sender<Envelope<T>>,
) -> Result<JoinHandle<()>> {
    let total = items.len();

    thread::Builder::new()
        .name("taskmill-feeder".into())
        .spawn(move || {
            for (index, item) in items.into_iter().enumerate() {
                if input_tx.send(Envelope::Task(Task { index, item })).is_err() {
                    warn!(index, total, "input channel closed before all tasks were enqueued");
                    return;
                }
            }
            debug!(total, "feeder finished enqueuing");
        })
        .map_err(|source| Error::Spawn {
            name: "feeder",
            source,
        })
}
