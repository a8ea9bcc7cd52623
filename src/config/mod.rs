//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Port the API listens on when `PORT` is not set
pub const DEFAULT_PORT: u16 = 4000;

/// Default token lifetime (one day)
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Default per-subscriber event queue depth
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 256;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// SQLite connection string (e.g. `sqlite://./data/catalog.db`)
    pub database_url: String,

    /// Secret used to sign and verify login tokens
    pub jwt_secret: String,

    /// Lifetime of issued login tokens in seconds
    pub token_lifetime_secs: i64,

    /// Number of undelivered events a subscriber may queue before it is disconnected
    pub subscription_buffer: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET is required")?;

        let port = match lookup("PORT") {
            Some(v) => v.parse().context("Invalid PORT")?,
            None => DEFAULT_PORT,
        };

        let token_lifetime_secs = match lookup("TOKEN_LIFETIME_SECS") {
            Some(v) => v.parse().context("Invalid TOKEN_LIFETIME_SECS")?,
            None => DEFAULT_TOKEN_LIFETIME_SECS,
        };

        let subscription_buffer = lookup("SUBSCRIPTION_BUFFER")
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_SUBSCRIPTION_BUFFER);

        Ok(Self {
            port,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://./data/catalog.db".to_string()),
            jwt_secret,
            token_lifetime_secs,
            subscription_buffer,
        })
    }
}
