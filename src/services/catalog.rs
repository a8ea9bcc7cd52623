//! Catalog operations: book, author and user CRUD plus login
//!
//! Resolvers stay thin and call into [CatalogService]; authentication checks,
//! author get-or-create and event publication all happen here.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::{AuthorRecord, BookRecord, CreateBook, CreateUser, Database, UserRecord};

use super::auth::{SHARED_LOGIN_PASSWORD, TokenService};
use super::errors::CatalogError;
use super::event_bus::{CatalogEvent, EventBus};

/// Genre filter value that matches every book
pub const ALL_GENRES: &str = "all";

/// Input for [CatalogService::add_book]
#[derive(Debug, Clone)]
pub struct AddBookInput {
    pub title: String,
    pub published: i32,
    /// Author name; the author is created if no author has this name yet
    pub author: String,
    pub genres: Vec<String>,
}

/// Drop repeated genres, keeping the first occurrence of each
fn dedup_genres(genres: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    genres
        .into_iter()
        .filter(|genre| seen.insert(genre.clone()))
        .collect()
}

#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    bus: EventBus,
    tokens: Arc<TokenService>,
}

impl CatalogService {
    pub fn new(db: Database, bus: EventBus, tokens: Arc<TokenService>) -> Self {
        Self { db, bus, tokens }
    }

    pub async fn book_count(&self) -> Result<i64, CatalogError> {
        Ok(self.db.books().count().await?)
    }

    pub async fn author_count(&self) -> Result<i64, CatalogError> {
        Ok(self.db.authors().count().await?)
    }

    /// All books, or only those tagged with `genre`. `None` and `"all"` both
    /// mean no filter.
    pub async fn all_books(&self, genre: Option<&str>) -> Result<Vec<BookRecord>, CatalogError> {
        let books = match genre {
            None | Some(ALL_GENRES) => self.db.books().list_all().await?,
            Some(genre) => self.db.books().list_by_genre(genre).await?,
        };
        debug!(genre = ?genre, count = books.len(), "Listed books");
        Ok(books)
    }

    pub async fn all_authors(&self) -> Result<Vec<AuthorRecord>, CatalogError> {
        Ok(self.db.authors().list_all().await?)
    }

    /// Persist a book, creating its author on first use, and announce it on
    /// the bus.
    pub async fn add_book(
        &self,
        current_user: Option<&UserRecord>,
        input: AddBookInput,
    ) -> Result<BookRecord, CatalogError> {
        let Some(user) = current_user else {
            return Err(CatalogError::Authorization {
                invalid_args: input.title,
            });
        };

        let author = self.get_or_create_author(&input.author).await?;

        let book = self
            .db
            .books()
            .create(CreateBook {
                title: input.title.clone(),
                published: input.published,
                genres: dedup_genres(input.genres),
                author_id: author.id,
            })
            .await
            .map_err(|source| CatalogError::Validation {
                action: "Saving book",
                invalid_args: input.title,
                source,
            })?;

        info!(
            book_id = %book.id,
            title = %book.title,
            author = %book.author.name,
            user = %user.username,
            "Book added"
        );

        let delivered = self.bus.publish(CatalogEvent::BookAdded(book.clone()));
        debug!(book_id = %book.id, subscribers = delivered, "BookAdded published");

        Ok(book)
    }

    async fn get_or_create_author(&self, name: &str) -> Result<AuthorRecord, CatalogError> {
        if let Some(author) = self.db.authors().get_by_name(name).await? {
            return Ok(author);
        }

        let author = self
            .db
            .authors()
            .create(name)
            .await
            .map_err(|source| CatalogError::AuthorCreation {
                name: name.to_string(),
                source,
            })?;
        info!(author_id = %author.id, name = %author.name, "Author created");
        Ok(author)
    }

    /// Set an author's birth year. An unknown name is `Ok(None)`, not an error.
    pub async fn edit_author(
        &self,
        current_user: Option<&UserRecord>,
        name: &str,
        set_born_to: i32,
    ) -> Result<Option<AuthorRecord>, CatalogError> {
        if current_user.is_none() {
            return Err(CatalogError::Authorization {
                invalid_args: name.to_string(),
            });
        }

        let Some(author) = self.db.authors().get_by_name(name).await? else {
            debug!(name, "editAuthor: no author with that name");
            return Ok(None);
        };

        let updated = self.db.authors().set_born(&author.id, set_born_to).await?;
        if let Some(ref a) = updated {
            info!(author_id = %a.id, born = set_born_to, "Author updated");
        }
        Ok(updated)
    }

    pub async fn create_user(
        &self,
        username: &str,
        favorite_genre: &str,
    ) -> Result<UserRecord, CatalogError> {
        let user = self
            .db
            .users()
            .create(CreateUser {
                username: username.to_string(),
                favorite_genre: favorite_genre.to_string(),
            })
            .await
            .map_err(|source| CatalogError::Validation {
                action: "Creating the user",
                invalid_args: username.to_string(),
                source,
            })?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Check credentials and issue a signed token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, CatalogError> {
        let user = self.db.users().get_by_username(username).await?;

        let user = match user {
            Some(user) if password == SHARED_LOGIN_PASSWORD => user,
            _ => {
                warn!(username, "Login rejected");
                return Err(CatalogError::Credential {
                    username: username.to_string(),
                });
            }
        };

        let token = self
            .tokens
            .sign(&user)
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))?;

        info!(user_id = %user.id, username = %user.username, "User logged in");
        Ok(token)
    }
}
