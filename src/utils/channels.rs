use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

/// Bounded event channel that never blocks the producer
///
/// The playback loop runs on the UI thread, so a listener that stops
/// draining must not stall it. Overflowing events are dropped.
pub struct EventChannel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> EventChannel<T> {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = bounded(buffer_size.max(1));
        Self { tx, rx }
    }

    /// Emit an event, dropping it if the queue is full
    pub fn emit(&self, event: T) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Event queue full, dropping event"),
            Err(TrySendError::Disconnected(_)) => trace!("Event queue disconnected"),
        }
    }

    /// Get a receiver for events
    pub fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }

    /// Drain all pending events
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }
}

pub fn event_channel<T>(buffer_size: usize) -> EventChannel<T> {
    EventChannel::new(buffer_size)
}
