//! Catalog services: business logic, tokens, events and the HTTP server

pub mod auth;
pub mod catalog;
pub mod errors;
pub mod event_bus;
pub mod http_server;
pub mod subscriptions;

pub use auth::{SHARED_LOGIN_PASSWORD, TokenClaims, TokenService};
pub use catalog::{ALL_GENRES, AddBookInput, CatalogService};
pub use errors::CatalogError;
pub use event_bus::{CatalogEvent, EventBus, Subscription, Topic};
pub use http_server::{ServerState, TransportServer};
pub use subscriptions::SubscriptionManager;
