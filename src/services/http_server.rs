//! Transport server: one schema behind HTTP and WebSocket on a single address.
//!
//! Lifecycle is `Initializing -> Starting -> Listening -> Draining -> Stopped`.
//! [TransportServer::new] builds the schema. [start](TransportServer::start)
//! binds and spawns the Axum server. [shutdown](TransportServer::shutdown)
//! refuses new WebSocket upgrades, disposes every live subscription
//! connection, then lets in-flight HTTP requests finish through Axum's
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::{AppState, build_app};
use crate::db::Database;
use crate::graphql::{AuthContextResolver, CatalogSchema, build_schema};

use super::auth::TokenService;
use super::catalog::CatalogService;
use super::event_bus::EventBus;
use super::subscriptions::SubscriptionManager;

/// Lifecycle state of the transport server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Initializing,
    Starting,
    Listening,
    Draining,
    Stopped,
}

pub struct TransportServer {
    db: Database,
    schema: CatalogSchema,
    resolver: AuthContextResolver,
    subscriptions: SubscriptionManager,
    state_tx: watch::Sender<ServerState>,
    /// Cancelled to start Axum's graceful shutdown
    http_shutdown: CancellationToken,
    /// Server task; set in start(), taken in shutdown().
    join_handle: Mutex<Option<JoinHandle<Result<()>>>>,
    local_addr: RwLock<Option<SocketAddr>>,
}

impl TransportServer {
    /// Assemble the schema and its collaborators. The bus is shared with
    /// every component that publishes or subscribes.
    pub fn new(db: Database, bus: EventBus, tokens: Arc<TokenService>) -> Self {
        let catalog = CatalogService::new(db.clone(), bus.clone(), tokens.clone());
        let subscriptions = SubscriptionManager::new(bus);
        let schema = build_schema(catalog, subscriptions.clone());
        let resolver = AuthContextResolver::new(db.clone(), tokens);
        let (state_tx, _) = watch::channel(ServerState::Initializing);
        info!(service = "http", "GraphQL schema built");

        Self {
            db,
            schema,
            resolver,
            subscriptions,
            state_tx,
            http_shutdown: CancellationToken::new(),
            join_handle: Mutex::new(None),
            local_addr: RwLock::new(None),
        }
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn state(&self) -> ServerState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    /// Bound address, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    /// Move to `to` if the current state is one of `from`; returns the state
    /// that was replaced.
    fn transition(&self, from: &[ServerState], to: ServerState) -> Result<ServerState, ServerState> {
        let mut previous = self.state();
        let changed = self.state_tx.send_if_modified(|state| {
            previous = *state;
            if from.contains(state) {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            info!(service = "http", from = ?previous, to = ?to, "Server state changed");
            Ok(previous)
        } else {
            Err(previous)
        }
    }

    /// Bind `addr` and start serving
    pub async fn start(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("HTTP server: bind {addr} failed"))?;
        self.start_with_listener(listener)
    }

    /// Start serving on an already bound listener
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<SocketAddr> {
        if let Err(state) = self.transition(&[ServerState::Initializing], ServerState::Starting) {
            bail!("server cannot start from state {state:?}");
        }

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.state_tx.send_replace(ServerState::Stopped);
                return Err(e).context("HTTP server: no local address");
            }
        };

        let app = build_app(AppState {
            db: self.db.clone(),
            schema: self.schema.clone(),
            resolver: self.resolver.clone(),
            subscriptions: self.subscriptions.clone(),
            lifecycle: self.state_tx.subscribe(),
        });

        let shutdown = self.http_shutdown.clone();
        let join = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .context("axum::serve")
        });

        *self.join_handle.lock() = Some(join);
        *self.local_addr.write() = Some(addr);
        let _ = self.transition(&[ServerState::Starting], ServerState::Listening);

        info!(service = "http", "Listening on http://{}; GraphQL and subscriptions at /", addr);
        Ok(addr)
    }

    /// Drain and stop. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        match self.transition(
            &[ServerState::Starting, ServerState::Listening],
            ServerState::Draining,
        ) {
            Ok(_) => {}
            Err(ServerState::Initializing) => {
                self.state_tx.send_replace(ServerState::Stopped);
                return Ok(());
            }
            Err(_) => return Ok(()),
        }

        // Subscriptions never finish on their own; dispose them first so the
        // drain below only waits on short requests.
        self.subscriptions.dispose_all().await;
        self.http_shutdown.cancel();

        let handle = self.join_handle.lock().take();
        let result = match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {e}")),
            },
            None => Ok(()),
        };
        if let Err(ref e) = result {
            warn!(service = "http", error = %e, "HTTP server stopped with error");
        }

        self.state_tx.send_replace(ServerState::Stopped);
        info!(service = "http", "HTTP server stopped");
        result
    }
}
