//! In-process publish/subscribe for catalog events
//!
//! One bus is created at startup and handed to every component that publishes
//! or subscribes. Each subscriber owns a bounded queue; publishing never
//! blocks. A subscriber that falls `capacity` events behind is disconnected:
//! it still drains what was queued, then its stream ends. Events are never
//! skipped on a stream that stays attached.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::db::BookRecord;

/// Routing key for published events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    BookAdded,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::BookAdded => "BOOK_ADDED",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain events carried by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A book was persisted; carries the book with its author joined
    BookAdded(BookRecord),
}

impl CatalogEvent {
    pub fn topic(&self) -> Topic {
        match self {
            CatalogEvent::BookAdded(_) => Topic::BookAdded,
        }
    }
}

type Subscribers = HashMap<Topic, HashMap<u64, mpsc::Sender<CatalogEvent>>>;

struct Inner {
    subscribers: RwLock<Subscribers>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

impl Inner {
    fn detach(&self, topic: Topic, id: u64) {
        let mut subscribers = self.subscribers.write();
        if let Some(topic_subs) = subscribers.get_mut(&topic) {
            if topic_subs.remove(&id).is_some() {
                debug!(topic = %topic, subscriber = id, "Subscriber detached");
            }
            if topic_subs.is_empty() {
                subscribers.remove(&topic);
            }
        }
    }
}

/// Process-wide event bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    /// Create a bus whose subscribers may each queue up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Deliver `event` to every subscriber currently attached to its topic.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: CatalogEvent) -> usize {
        let topic = event.topic();
        // Held for the whole fan-out so concurrent publishes reach every
        // subscriber in the same order.
        let mut subscribers = self.inner.subscribers.write();
        let Some(topic_subs) = subscribers.get_mut(&topic) else {
            debug!(topic = %topic, "Published with no subscribers");
            return 0;
        };

        let mut delivered = 0;
        topic_subs.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    topic = %topic,
                    subscriber = *id,
                    capacity = self.inner.capacity,
                    "Subscriber queue full, disconnecting"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        if topic_subs.is_empty() {
            subscribers.remove(&topic);
        }

        debug!(topic = %topic, delivered, "Event published");
        delivered
    }

    /// Attach a new subscriber to `topic`.
    ///
    /// The subscription sees only events published after this call. Once the
    /// bus is closed, the returned subscription is already finished.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.inner.subscribers.write();
        if self.inner.closed.load(Ordering::Acquire) {
            drop(tx);
        } else {
            subscribers.entry(topic).or_default().insert(id, tx);
            debug!(topic = %topic, subscriber = id, "Subscriber attached");
        }

        Subscription {
            id,
            topic,
            receiver: rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Number of subscribers attached to `topic`
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .subscribers
            .read()
            .get(&topic)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Detach every subscriber and refuse new ones
    pub fn close(&self) {
        let mut subscribers = self.inner.subscribers.write();
        self.inner.closed.store(true, Ordering::Release);
        let detached: usize = subscribers.values().map(HashMap::len).sum();
        subscribers.clear();
        debug!(detached, "Event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// A single consumer's view of one topic.
///
/// Yields events in publish order. Dropping it detaches it from the bus.
pub struct Subscription {
    id: u64,
    topic: Topic,
    receiver: mpsc::Receiver<CatalogEvent>,
    bus: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

impl Stream for Subscription {
    type Item = CatalogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.detach(self.topic, self.id);
        }
    }
}
