//! Catalog API - GraphQL service for a small library catalog
//!
//! Books, authors and users are kept in SQLite. Queries and mutations are
//! served over HTTP POST, and new books are pushed to WebSocket subscribers
//! on the same path.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod graphql;
pub mod services;
