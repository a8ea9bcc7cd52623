//! GraphQL schema definition with queries, mutations, and subscriptions

use async_graphql::extensions::Tracing;
use async_graphql::{MergedObject, MergedSubscription, Schema};

use crate::services::{CatalogService, SubscriptionManager};

use super::mutations::{AuthorMutations, BookMutations, UserMutations};
use super::queries::{AuthorQueries, BookQueries, UserQueries};
use super::subscriptions::BookSubscriptions;

/// The GraphQL schema type
pub type CatalogSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(BookQueries, AuthorQueries, UserQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(BookMutations, AuthorMutations, UserMutations);

#[derive(MergedSubscription, Default)]
pub struct SubscriptionRoot(BookSubscriptions);

/// Build the GraphQL schema with all resolvers
pub fn build_schema(catalog: CatalogService, subscriptions: SubscriptionManager) -> CatalogSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        SubscriptionRoot::default(),
    )
    .data(catalog)
    .data(subscriptions)
    .extension(Tracing)
    .finish()
}
