//! Event channel over crossbeam-channel.

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::time::Duration;

use super::Event;

/// Sends events from the engine, watchers and schedule timers.
///
/// Cheap to clone; every background thread holds its own copy.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    pub fn new(sender: Sender<Event>) -> Self {
        Self { inner: sender }
    }

    /// Send an event. Non-blocking if the channel isn't full.
    ///
    /// If the receiver is dropped, the event is silently discarded.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }

    /// Send without blocking; the event is dropped when a bounded channel is full.
    ///
    /// Used from timer and watcher threads that must never stall on a slow UI.
    pub fn try_send(&self, event: Event) {
        let _ = self.inner.try_send(event);
    }
}

/// Receives events from the engine.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event is received
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Wait at most `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.inner.recv_timeout(timeout).ok()
    }

    /// Returns an iterator over received events
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }

    /// Like [`iter`](Self::iter), but also ends once `stop` receives a
    /// message or disconnects, even while senders are still alive.
    ///
    /// Events already queued when the stop arrives are still yielded.
    pub fn iter_until<'a>(
        &'a self,
        stop: &'a Receiver<()>,
    ) -> impl Iterator<Item = Event> + 'a {
        let mut remaining: Option<usize> = None;
        std::iter::from_fn(move || loop {
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    return None;
                }
                *left -= 1;
                return self.inner.try_recv().ok();
            }
            select! {
                recv(self.inner) -> event => return event.ok(),
                recv(stop) -> _ => remaining = Some(self.inner.len()),
            }
        })
    }
}

/// A bidirectional event channel for communication between
/// the engine and whatever renders its output.
pub struct EventChannel;

impl EventChannel {
    /// Create a new unbounded event channel.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }

    /// Create a bounded event channel with the specified capacity.
    ///
    /// Senders using [`EventSender::try_send`] drop events once it is full.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        EventChannel
    }
}

/// A sender whose receiver is already gone; every event is discarded.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}
