//! GraphQL API with subscriptions for real-time updates
//!
//! This module provides a GraphQL API using async-graphql with support for
//! queries, mutations, and subscriptions over WebSocket. It is the only API
//! surface of the catalog.

pub mod auth;
pub mod mutations;
pub mod queries;
mod schema;
mod subscriptions;
pub mod types;

pub use auth::{AuthContextResolver, AuthExt, RequestContext, bearer_token};
pub use schema::{CatalogSchema, MutationRoot, QueryRoot, SubscriptionRoot, build_schema};
