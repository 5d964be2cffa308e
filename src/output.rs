//! Lazy, pull-based view over a relay queue.

use crate::relay::Relay;
use crossbeam_channel::Receiver;
use std::thread::JoinHandle;

/// The output of a parallel map.
///
/// Each `next()` blocks until the producer relays a result. The sentinel ends
/// the sequence; every later `next()` returns `None` again, so the sequence is
/// single pass and cannot be restarted.
///
/// With an infinite source no sentinel ever arrives: bound the consumption with
/// `take`/`head` on the caller side.
pub struct OutputSequence<T> {
    rx: Receiver<Relay<T>>,
    producer: Option<JoinHandle<()>>,
    finished: bool,
    abnormal: bool,
}

impl<T> OutputSequence<T> {
    pub(crate) fn new(rx: Receiver<Relay<T>>) -> Self {
        Self {
            rx,
            producer: None,
            finished: false,
            abnormal: false,
        }
    }

    /// Attach the thread feeding this sequence; it is joined once the stream ends.
    pub(crate) fn attach_producer(&mut self, handle: JoinHandle<()>) {
        self.producer = Some(handle);
    }

    /// Number of results currently buffered in the relay queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    /// Whether the sentinel (or an abnormal end) has been observed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True when the producer vanished without sending the end-of-stream marker.
    #[must_use]
    pub fn ended_abnormally(&self) -> bool {
        self.abnormal
    }

    fn close(&mut self) {
        self.finished = true;
        if let Some(handle) = self.producer.take()
            && handle.join().is_err()
        {
            log::error!("submission loop thread panicked");
        }
    }
}

impl<T> Iterator for OutputSequence<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(Relay::Item(item)) => Some(item),
            Ok(Relay::EndOfStream) => {
                self.close();
                None
            }
            Err(_) => {
                log::error!("relay queue disconnected before end of stream");
                self.abnormal = true;
                self.close();
                None
            }
        }
    }
}

impl<T> std::iter::FusedIterator for OutputSequence<T> {}
