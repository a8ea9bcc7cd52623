use super::prelude::*;

#[derive(Default)]
pub struct AuthorQueries;

#[Object]
impl AuthorQueries {
    /// Total number of authors in the catalog
    async fn author_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let count = catalog.author_count().await.extend()?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Every author with their book count
    async fn all_authors(&self, ctx: &Context<'_>) -> Result<Vec<Author>> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let authors = catalog.all_authors().await.extend()?;
        Ok(authors.into_iter().map(Author::from).collect())
    }
}
