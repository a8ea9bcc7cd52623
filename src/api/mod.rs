//! HTTP route definitions
//!
//! GraphQL is served at `/` for both POST requests and WebSocket
//! subscriptions. Health endpoints sit alongside it.

pub mod graphql;
pub mod health;
