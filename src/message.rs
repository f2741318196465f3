//! Channel message types.
//!
//! Both channels carry explicit tagged variants instead of magic sentinel
//! values, so a control signal can never be confused with a legitimate
//! payload. No result data flows through either channel: workers write their
//! outputs straight into their private store connections.

/// One unit of input work. Identity is positional: the index records where
/// the item sat in the original collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task<T> {
    pub index: usize,
    pub item: T,
}

/// Message on the input channel.
///
/// `Shutdown` is pushed exactly once by the runner and re-pushed by every
/// worker that observes it, so the single token reaches the whole pool.
#[derive(Debug)]
pub enum Envelope<T> {
    Task(Task<T>),
    Shutdown,
}

/// Message on the control channel, one per pulled task.
///
/// `TaskDone` carries no task identity: the runner tracks counts, not which
/// task completed. `TaskFailed` is the one exception, since a failure report
/// is useless without knowing what failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    TaskDone,
    TaskFailed {
        worker: usize,
        index: usize,
        message: String,
    },
}
