//! GraphQL subscriptions for real-time updates
//!
//! Subscriptions are served over WebSocket. Each one holds a bus subscription
//! that is released as soon as the client stops it or the connection closes.

use async_graphql::{Context, Subscription};
use futures::Stream;
use tokio_stream::StreamExt;

use crate::services::SubscriptionManager;

use super::types::Book;

#[derive(Default)]
pub struct BookSubscriptions;

#[Subscription]
impl BookSubscriptions {
    /// Emitted once for every successful `addBook`
    async fn book_added<'ctx>(&self, ctx: &Context<'ctx>) -> impl Stream<Item = Book> + 'ctx {
        let subscriptions = ctx.data_unchecked::<SubscriptionManager>();
        subscriptions.book_added().map(Book::from)
    }
}
