//! Progress reporting.
//!
//! The runner talks to a minimal sink contract: the total is fixed at
//! construction, completions arrive one at a time, and the sink is closed at
//! the end of the run. The default sink renders an indicatif bar; `Silent`
//! swallows everything; tests plug in their own counters through
//! [`Runner::with_progress`](crate::Runner::with_progress).

use indicatif::{ProgressBar, ProgressStyle};

/// Where per-task completions go. The total is handed over at construction,
/// never inferred from the shape of the input collection.
pub trait ProgressSink: Send + Sync {
    /// One more task finished.
    fn inc(&self);

    /// The run is over; release any display resources.
    fn finish(&self);
}

/// Builds one sink per run, given the explicit total.
pub type ProgressFactory = Box<dyn Fn(u64) -> Box<dyn ProgressSink> + Send + Sync>;

/// Indicatif-backed progress bar.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(total: u64) -> Self {
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} tasks ({percent}%) {msg}",
        )
        .unwrap()
        .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::new(total);
        bar.set_style(style);

        Self { bar }
    }
}

impl ProgressSink for ConsoleProgress {
    fn inc(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Sink that discards everything. Used when progress display is disabled.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn inc(&self) {}

    fn finish(&self) {}
}
