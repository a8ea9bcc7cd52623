use super::prelude::*;

#[derive(Default)]
pub struct BookQueries;

#[Object]
impl BookQueries {
    /// Total number of books in the catalog
    async fn all_books_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let count = catalog.book_count().await.extend()?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Books with their authors. `genre: "all"` is the same as no filter.
    async fn all_books(&self, ctx: &Context<'_>, genre: Option<String>) -> Result<Vec<Book>> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let books = catalog.all_books(genre.as_deref()).await.extend()?;
        Ok(books.into_iter().map(Book::from).collect())
    }
}
