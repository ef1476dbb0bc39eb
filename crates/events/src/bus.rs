//! Fan-out of committed alert transitions to whoever listens (notifiers,
//! dashboards, tests).
//!
//! A bus never holds state of its own. The store is authoritative; a consumer
//! that misses messages can always re-read open alerts from it.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Receiving end handed out by [`EventBus::subscribe`].
///
/// Sees every message published after it was created, in publication order.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Next message, blocking. `None` once the bus is gone and the queue is empty.
    pub fn next_blocking(&self) -> Option<M> {
        self.receiver.recv().ok()
    }

    /// Next message if one is already queued.
    pub fn poll(&self) -> Option<M> {
        self.receiver.try_recv().ok()
    }

    /// Wait at most `timeout` for the next message.
    pub fn wait(&self, timeout: Duration) -> Option<M> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Publish side of the bus.
///
/// The recalculation handler publishes only after `commit_pass` returned, so a
/// publish failure never describes a write that did not happen. It can,
/// however, leave consumers behind the store.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        <B as EventBus<M>>::publish(self, message)
    }

    fn subscribe(&self) -> Subscription<M> {
        <B as EventBus<M>>::subscribe(self)
    }
}
