pub mod authors;
pub mod books;
pub mod user;

pub use authors::AuthorMutations;
pub use books::BookMutations;
pub use user::UserMutations;

pub(crate) mod prelude {
    pub(crate) use async_graphql::{Context, Object, Result, ResultExt};

    pub(crate) use crate::graphql::auth::AuthExt;
    pub(crate) use crate::graphql::types::*;
    pub(crate) use crate::services::{AddBookInput, CatalogService};
}
