//! SQLite helper utilities for type conversion
//!
//! SQLite has no native UUID or array types. Identifiers are stored as
//! hyphenated UUID strings and genre lists as JSON text.

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Generate a fresh record identifier
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serialize a Vec to a JSON string for SQLite storage
#[inline]
pub fn vec_to_json<T: Serialize>(v: &[T]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

/// Deserialize a JSON string from SQLite to a Vec
#[inline]
pub fn json_to_vec<T: DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Get current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}
