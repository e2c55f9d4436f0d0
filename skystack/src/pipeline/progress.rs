//! Progress reporting and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

/// One progress update: a human-readable message and overall completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub message: String,
    /// 0..=100, non-decreasing within a run.
    pub percent: u8,
}

/// Receives progress updates. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards updates to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, event: ProgressEvent) {
        tracing::info!(percent = event.percent, "{}", event.message);
    }
}

/// Forwards updates over an unbounded channel.
#[derive(Debug)]
pub struct ChannelProgress {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn channel() -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        // a dropped receiver only means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

/// Shared flag a caller sets to stop a run at its next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Wraps a sink and keeps reported percentages monotonic.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink, last: 0 }
    }

    pub(crate) fn report(&mut self, message: impl Into<String>, percent: u8) {
        let percent = percent.clamp(self.last, 100);
        self.last = percent;
        self.sink.report(ProgressEvent {
            message: message.into(),
            percent,
        });
    }

    /// `start + done/total * span`, rounded down.
    pub(crate) fn fraction(start: u8, span: u8, done: usize, total: usize) -> u8 {
        if total == 0 {
            return start + span;
        }
        start + (done.min(total) * span as usize / total) as u8
    }
}
