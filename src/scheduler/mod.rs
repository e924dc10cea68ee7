//! Scheduler module for running probe phases.
//!
//! Each phase fans probes out to tokio tasks, collects their samples and
//! streams them to a single log writer task.

mod dns;
mod http;

pub use dns::*;
pub use http::*;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::Sample;

/// Receives every sample of a phase, one at a time, from the log writer task.
pub trait SampleSink: Send + 'static {
    fn record(&mut self, sample: &Sample);
}

impl<F> SampleSink for F
where
    F: FnMut(&Sample) + Send + 'static,
{
    fn record(&mut self, sample: &Sample) {
        self(sample)
    }
}

/// Start the log writer for a phase.
///
/// The returned sender is the coordinator's handle. Workers get clones; the
/// channel closes once the coordinator drops its handle after the join barrier.
fn spawn_log_writer<S: SampleSink>(
    capacity: usize,
    sink: S,
) -> (mpsc::Sender<Sample>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run_log_writer(rx, sink));
    (tx, handle)
}

/// Drain the log channel into `sink` until every sender is gone.
async fn run_log_writer<S: SampleSink>(mut rx: mpsc::Receiver<Sample>, mut sink: S) {
    let mut written = 0usize;
    while let Some(sample) = rx.recv().await {
        sink.record(&sample);
        written += 1;
    }
    tracing::debug!("Log writer finished after {} samples", written);
}

/// Close the log channel and wait for the writer to flush.
async fn finish_log_writer(tx: mpsc::Sender<Sample>, handle: JoinHandle<()>) {
    drop(tx);
    if let Err(e) = handle.await {
        tracing::error!("Log writer task failed: {}", e);
    }
}
