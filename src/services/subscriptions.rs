//! Live subscription connections
//!
//! Every WebSocket connection runs through [SubscriptionManager::serve_connection]
//! so shutdown can cancel it. Streams handed to the schema come from the
//! shared [EventBus] and detach from it when the connection drops them.

use std::future::Future;

use futures::Stream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::db::BookRecord;

use super::event_bus::{CatalogEvent, EventBus, Topic};

#[derive(Clone)]
pub struct SubscriptionManager {
    bus: EventBus,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl SubscriptionManager {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            shutdown: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Books added from now on, each with its author joined
    pub fn book_added(&self) -> impl Stream<Item = BookRecord> + Send + 'static {
        self.bus
            .subscribe(Topic::BookAdded)
            .map(|event| match event {
                CatalogEvent::BookAdded(book) => book,
            })
    }

    /// Drive one persistent connection until it finishes or shutdown disposes it
    pub async fn serve_connection<F>(&self, connection: F)
    where
        F: Future<Output = ()>,
    {
        let shutdown = self.shutdown.clone();
        let tracked = self.connections.track_future(async move {
            tokio::select! {
                _ = connection => debug!("Subscription connection closed by client"),
                _ = shutdown.cancelled() => debug!("Subscription connection disposed"),
            }
        });
        tracked.await;
    }

    /// True once [dispose_all](Self::dispose_all) has begun
    pub fn is_draining(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of persistent connections currently being served
    pub fn live_connections(&self) -> usize {
        self.connections.len()
    }

    /// Cancel every live connection, close the bus and wait for connection
    /// tasks to finish
    pub async fn dispose_all(&self) {
        let live = self.live_connections();
        info!(live_connections = live, "Disposing subscription connections");

        self.shutdown.cancel();
        self.bus.close();
        self.connections.close();
        self.connections.wait().await;

        info!("All subscription connections disposed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::AuthorRecord;

    fn book() -> BookRecord {
        BookRecord {
            id: "book-1".to_string(),
            title: "Dune".to_string(),
            published: 1965,
            genres: vec!["scifi".to_string()],
            author: AuthorRecord {
                id: "author-1".to_string(),
                name: "Frank Herbert".to_string(),
                born: None,
                book_count: 1,
            },
        }
    }

    #[tokio::test]
    async fn test_book_added_stream() {
        let manager = SubscriptionManager::new(EventBus::new(8));
        let mut stream = Box::pin(manager.book_added());
        assert_eq!(manager.bus().subscriber_count(Topic::BookAdded), 1);

        manager.bus().publish(CatalogEvent::BookAdded(book()));
        assert_eq!(stream.next().await, Some(book()));

        drop(stream);
        assert_eq!(manager.bus().subscriber_count(Topic::BookAdded), 0);
    }

    #[tokio::test]
    async fn test_dispose_all_cancels_pending_connections() {
        let manager = SubscriptionManager::new(EventBus::new(8));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.serve_connection(futures::future::pending::<()>()).await;
            }));
        }

        // let the spawned connections register
        for _ in 0..100 {
            if manager.live_connections() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(manager.live_connections(), 3);
        assert!(!manager.is_draining());

        tokio::time::timeout(Duration::from_secs(5), manager.dispose_all())
            .await
            .expect("dispose_all should not hang");

        assert!(manager.is_draining());
        assert!(manager.bus().is_closed());
        assert_eq!(manager.live_connections(), 0);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_subscription_streams_end_on_dispose() {
        let manager = SubscriptionManager::new(EventBus::new(8));
        let mut stream = Box::pin(manager.book_added());

        manager.dispose_all().await;
        assert_eq!(stream.next().await, None);
    }
}
