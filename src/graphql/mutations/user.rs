use super::prelude::*;

#[derive(Default)]
pub struct UserMutations;

#[Object]
impl UserMutations {
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        favorite_genre: String,
    ) -> Result<User> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let user = catalog.create_user(&username, &favorite_genre).await.extend()?;
        Ok(user.into())
    }

    /// Exchange a username and password for a bearer token
    async fn login(&self, ctx: &Context<'_>, username: String, password: String) -> Result<Token> {
        let catalog = ctx.data_unchecked::<CatalogService>();
        let value = catalog.login(&username, &password).await.extend()?;
        Ok(Token { value })
    }
}
