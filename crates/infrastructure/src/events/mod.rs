//! In-process publish/subscribe bus for resolver activity.
//!
//! Publishing never blocks: each subscriber has a bounded channel and a
//! full channel drops the event for that subscriber only. A slow consumer
//! can therefore never stall the resolution loop.

mod types;

pub use types::{EventType, ResolverEvent};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<ResolverEvent>>>,
    next_id: AtomicU64,
}

/// Handle for removing a subscription. Dropping the handle without calling
/// [`Subscription::unsubscribe`] leaves the subscription alive.
pub struct Subscription {
    id: u64,
    inner: Arc<BusInner>,
}

impl Subscription {
    /// Remove the subscription and close its channel.
    pub fn unsubscribe(self) {
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            subscribers.remove(&self.id);
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with the given channel capacity.
    /// A zero buffer falls back to [`DEFAULT_EVENT_BUFFER`].
    pub fn subscribe(&self, buffer: usize) -> (mpsc::Receiver<ResolverEvent>, Subscription) {
        let buffer = if buffer == 0 {
            DEFAULT_EVENT_BUFFER
        } else {
            buffer
        };
        let (tx, rx) = mpsc::channel(buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            subscribers.insert(id, tx);
        }
        (
            rx,
            Subscription {
                id,
                inner: Arc::clone(&self.inner),
            },
        )
    }

    /// Deliver the event to every subscriber that has room.
    pub fn publish(&self, event: ResolverEvent) {
        let Ok(subscribers) = self.inner.subscribers.read() else { return };
        for tx in subscribers.values() {
            let _ = tx.try_send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}
