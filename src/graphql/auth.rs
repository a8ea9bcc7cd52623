//! GraphQL authentication context
//!
//! Every executed request carries a [RequestContext]. It is rebuilt from the
//! credential on each request and never cached.
//!
//! - No `Authorization` header, or one not using the `Bearer` scheme:
//!   anonymous.
//! - A bearer token that fails verification: the whole request fails with
//!   `UNAUTHENTICATED`.
//! - A valid token whose user no longer exists: anonymous. Resolvers must
//!   check `current_user`, not just the presence of the context.

use std::sync::Arc;

use async_graphql::Context;
use tracing::debug;

use crate::db::{Database, UserRecord};
use crate::services::{CatalogError, TokenService};

const BEARER_PREFIX: &str = "Bearer ";

/// Identity attached to one request or one WebSocket connection
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub current_user: Option<UserRecord>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: UserRecord) -> Self {
        Self {
            current_user: Some(user),
        }
    }
}

/// Extract the token from a `Bearer` authorization value
pub fn bearer_token(authorization: &str) -> Option<&str> {
    authorization.strip_prefix(BEARER_PREFIX)
}

/// Turns a raw authorization value into a [RequestContext]
#[derive(Clone)]
pub struct AuthContextResolver {
    db: Database,
    tokens: Arc<TokenService>,
}

impl AuthContextResolver {
    pub fn new(db: Database, tokens: Arc<TokenService>) -> Self {
        Self { db, tokens }
    }

    pub async fn resolve(&self, authorization: Option<&str>) -> Result<RequestContext, CatalogError> {
        let Some(token) = authorization.and_then(bearer_token) else {
            return Ok(RequestContext::anonymous());
        };

        let claims = self.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "Token verification failed");
            CatalogError::Authentication {
                reason: e.to_string(),
            }
        })?;

        let current_user = self.db.users().get_by_id(&claims.id).await?;
        if current_user.is_none() {
            debug!(user_id = %claims.id, "Token valid but user not found");
        }

        Ok(RequestContext { current_user })
    }
}

/// Extension trait to read the request identity from a GraphQL context
pub trait AuthExt {
    /// The logged-in user, if the request has one
    fn current_user(&self) -> Option<&UserRecord>;
}

impl<'a> AuthExt for Context<'a> {
    fn current_user(&self) -> Option<&UserRecord> {
        self.data_opt::<RequestContext>()
            .and_then(|ctx| ctx.current_user.as_ref())
    }
}
