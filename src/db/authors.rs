//! Authors repository
//!
//! Book counts are derived on read from the `books` table rather than stored.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::sqlite_helpers::{new_id, now_iso8601};

/// Author columns plus the derived book count
pub(crate) const AUTHOR_COLUMNS: &str = "a.id, a.name, a.born, \
     (SELECT COUNT(*) FROM books c WHERE c.author_id = a.id) AS book_count";

type AuthorRow = (String, String, Option<i32>, i64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub born: Option<i32>,
    pub book_count: i64,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(r: AuthorRow) -> Self {
        Self {
            id: r.0,
            name: r.1,
            born: r.2,
            book_count: r.3,
        }
    }
}

pub struct AuthorRepository {
    pool: SqlitePool,
}

impl AuthorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an author with no birth year
    pub async fn create(&self, name: &str) -> Result<AuthorRecord> {
        let id = new_id();

        sqlx::query("INSERT INTO authors (id, name, born, created_at) VALUES (?, ?, NULL, ?)")
            .bind(&id)
            .bind(name)
            .bind(now_iso8601())
            .execute(&self.pool)
            .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to create author"))
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<AuthorRecord>> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthorRecord::from))
    }

    /// Get author by exact name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<AuthorRecord>> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthorRecord::from))
    }

    /// List all authors in creation order
    pub async fn list_all(&self) -> Result<Vec<AuthorRecord>> {
        let rows = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors a ORDER BY a.created_at, a.rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuthorRecord::from).collect())
    }

    /// Set the birth year. Returns the updated author, or `None` if the id is unknown.
    pub async fn set_born(&self, id: &str, born: i32) -> Result<Option<AuthorRecord>> {
        let result = sqlx::query("UPDATE authors SET born = ? WHERE id = ?")
            .bind(born)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Count all authors
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
