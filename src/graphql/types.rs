//! GraphQL object types
//!
//! Thin wrappers over the database records. Field names are exposed in
//! camelCase (`bookCount`, `favoriteGenre`).

use async_graphql::{ID, SimpleObject};

use crate::db::{AuthorRecord, BookRecord, UserRecord};

#[derive(Debug, Clone, SimpleObject)]
pub struct Author {
    pub id: ID,
    pub name: String,
    /// Birth year, if known
    pub born: Option<i32>,
    /// Number of books in the catalog by this author
    pub book_count: i32,
}

impl From<AuthorRecord> for Author {
    fn from(r: AuthorRecord) -> Self {
        Self {
            id: ID(r.id),
            name: r.name,
            born: r.born,
            book_count: i32::try_from(r.book_count).unwrap_or(i32::MAX),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Book {
    pub id: ID,
    pub title: String,
    pub published: i32,
    pub author: Author,
    pub genres: Vec<String>,
}

impl From<BookRecord> for Book {
    fn from(r: BookRecord) -> Self {
        Self {
            id: ID(r.id),
            title: r.title,
            published: r.published,
            author: r.author.into(),
            genres: r.genres,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct User {
    pub id: ID,
    pub username: String,
    pub favorite_genre: String,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: ID(r.id),
            username: r.username,
            favorite_genre: r.favorite_genre,
        }
    }
}

/// Signed login token
#[derive(Debug, Clone, SimpleObject)]
pub struct Token {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(book_count: i64) -> AuthorRecord {
        AuthorRecord {
            id: "author-1".to_string(),
            name: "Frank Herbert".to_string(),
            born: Some(1920),
            book_count,
        }
    }

    #[test]
    fn test_author_from_record() {
        let author = Author::from(author(3));
        assert_eq!(author.id, ID("author-1".to_string()));
        assert_eq!(author.book_count, 3);
        assert_eq!(author.born, Some(1920));
    }

    #[test]
    fn test_book_count_saturates() {
        assert_eq!(Author::from(author(i64::from(i32::MAX) + 1)).book_count, i32::MAX);
        assert_eq!(Author::from(author(i64::MAX)).book_count, i32::MAX);
    }
}
