//! Books repository
//!
//! Every read joins the owning author, so callers never see a bare author id.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::authors::{AUTHOR_COLUMNS, AuthorRecord};
use super::sqlite_helpers::{json_to_vec, new_id, now_iso8601, vec_to_json};

type BookRow = (String, String, i32, String, String, String, Option<i32>, i64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub published: i32,
    pub genres: Vec<String>,
    pub author: AuthorRecord,
}

impl From<BookRow> for BookRecord {
    fn from(r: BookRow) -> Self {
        Self {
            id: r.0,
            title: r.1,
            published: r.2,
            genres: json_to_vec(&r.3),
            author: AuthorRecord::from((r.4, r.5, r.6, r.7)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBook {
    pub title: String,
    pub published: i32,
    pub genres: Vec<String>,
    pub author_id: String,
}

fn select_books(filter: &str) -> String {
    format!(
        "SELECT bk.id, bk.title, bk.published, bk.genres, {AUTHOR_COLUMNS} \
         FROM books bk JOIN authors a ON a.id = bk.author_id {filter} \
         ORDER BY bk.created_at, bk.rowid"
    )
}

pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a book and return it with its author joined
    pub async fn create(&self, book: CreateBook) -> Result<BookRecord> {
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO books (id, title, published, genres, author_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&book.title)
        .bind(book.published)
        .bind(vec_to_json(&book.genres))
        .bind(&book.author_id)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to create book"))
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<BookRecord>> {
        let row = sqlx::query_as::<_, BookRow>(&select_books("WHERE bk.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(BookRecord::from))
    }

    /// List every book
    pub async fn list_all(&self) -> Result<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(&select_books(""))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    /// List books whose genre list contains `genre`
    pub async fn list_by_genre(&self, genre: &str) -> Result<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(&select_books(
            "WHERE EXISTS (SELECT 1 FROM json_each(bk.genres) g WHERE g.value = ?)",
        ))
        .bind(genre)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    /// Count all books
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
