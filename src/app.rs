//! Application state and HTTP router construction.
//!
//! Used by [TransportServer](crate::services::TransportServer) to build the
//! Axum app it serves.

use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::db::Database;
use crate::graphql::{AuthContextResolver, CatalogSchema};
use crate::services::{ServerState, SubscriptionManager};

/// Shared state for HTTP handlers (GraphQL, health).
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub schema: CatalogSchema,
    pub resolver: AuthContextResolver,
    pub subscriptions: SubscriptionManager,
    pub lifecycle: watch::Receiver<ServerState>,
}

/// Build the full Axum router: GraphQL at `/`, health endpoints, and layers.
/// Returns Router<()> (state fully applied) for use with axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .merge(api::health::router())
        .merge(api::graphql::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
