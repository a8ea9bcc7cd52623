use super::prelude::*;

#[derive(Default)]
pub struct BookMutations;

#[Object]
impl BookMutations {
    /// Add a book, creating its author if needed. Requires login.
    async fn add_book(
        &self,
        ctx: &Context<'_>,
        title: String,
        published: i32,
        author: String,
        genres: Vec<String>,
    ) -> Result<Book> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let book = catalog
            .add_book(
                ctx.current_user(),
                AddBookInput {
                    title,
                    published,
                    author,
                    genres,
                },
            )
            .await
            .extend()?;
        Ok(book.into())
    }
}
