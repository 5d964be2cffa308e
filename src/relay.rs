//! Bounded relay queue between a submission loop and its output sequence.
//!
//! The queue carries [`Relay::Item`]s followed by exactly one
//! [`Relay::EndOfStream`]. Capacity equals the worker count, so a slow consumer
//! stalls the producer instead of letting results pile up.

use crate::error::DcError;
use crate::output::OutputSequence;
use crossbeam_channel::{Sender, bounded as channel};

/// One slot of the relay queue.
#[derive(Debug)]
pub enum Relay<T> {
    Item(T),
    EndOfStream,
}

/// Producer half of the relay queue.
///
/// [`RelaySender::finish`] takes `self`, so a run can enqueue the sentinel at
/// most once and nothing can be enqueued after it.
pub struct RelaySender<T> {
    tx: Sender<Relay<T>>,
}

impl<T> RelaySender<T> {
    /// Enqueue a result, blocking while the queue is full.
    ///
    /// # Errors
    /// [`DcError::ConsumerGone`] if the output sequence was dropped.
    pub fn put(&self, item: T) -> Result<(), DcError> {
        self.tx
            .send(Relay::Item(item))
            .map_err(|_| DcError::ConsumerGone)
    }

    /// Enqueue the end-of-stream sentinel.
    ///
    /// # Errors
    /// [`DcError::ConsumerGone`] if the output sequence was dropped.
    pub fn finish(self) -> Result<(), DcError> {
        self.tx
            .send(Relay::EndOfStream)
            .map_err(|_| DcError::ConsumerGone)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Create a relay queue holding at most `capacity` items (minimum 1).
pub fn bounded<T>(capacity: usize) -> (RelaySender<T>, OutputSequence<T>) {
    let (tx, rx) = channel(capacity.max(1));
    (RelaySender { tx }, OutputSequence::new(rx))
}
