//! Catalog error taxonomy
//!
//! Every variant maps to a stable GraphQL `code` extension. The offending
//! input goes out as `invalidArgs` and any store failure as `error`.

use async_graphql::ErrorExtensions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A bearer token was presented but failed signature or expiry checks
    #[error("Invalid token: {reason}")]
    Authentication { reason: String },

    /// The operation needs a logged-in user and the request has none
    #[error("User not authorized")]
    Authorization { invalid_args: String },

    /// The store rejected a new book or user
    #[error("{action} failed")]
    Validation {
        action: &'static str,
        invalid_args: String,
        #[source]
        source: anyhow::Error,
    },

    /// The store rejected a new author
    #[error("Saving author failed")]
    AuthorCreation {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("wrong credentials")]
    Credential { username: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CatalogError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "UNAUTHENTICATED",
            Self::Authorization { .. } => "INVALID_TOKEN",
            Self::Validation { .. } => "BAD_USER_INPUT",
            Self::AuthorCreation { .. } => "INVALID_AUTHOR_NAME",
            Self::Credential { .. } => "WRONG_CREDENTIALS",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// The input value that caused the failure, if there is one
    pub fn invalid_args(&self) -> Option<&str> {
        match self {
            Self::Authorization { invalid_args } | Self::Validation { invalid_args, .. } => {
                Some(invalid_args.as_str())
            }
            Self::AuthorCreation { name, .. } => Some(name.as_str()),
            Self::Credential { username } => Some(username.as_str()),
            Self::Authentication { .. } | Self::Internal(_) => None,
        }
    }

    /// Underlying store error rendered with its full context chain
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::Validation { source, .. } | Self::AuthorCreation { source, .. } => {
                Some(format!("{source:#}"))
            }
            _ => None,
        }
    }
}

impl ErrorExtensions for CatalogError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", self.code());
            if let Some(args) = self.invalid_args() {
                e.set("invalidArgs", args);
            }
            if let Some(cause) = self.cause() {
                e.set("error", cause);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::Value;

    use super::*;

    fn extension(err: &async_graphql::Error, key: &str) -> Option<Value> {
        err.extensions.as_ref().and_then(|ext| ext.get(key).cloned())
    }

    #[test]
    fn test_author_creation_carries_name_and_cause() {
        let err = CatalogError::AuthorCreation {
            name: "X".to_string(),
            source: anyhow::anyhow!("UNIQUE constraint failed: authors.name"),
        };
        let gql = err.extend();

        assert_eq!(gql.message, "Saving author failed");
        assert_eq!(extension(&gql, "code"), Some(Value::from("INVALID_AUTHOR_NAME")));
        assert_eq!(extension(&gql, "invalidArgs"), Some(Value::from("X")));
        assert_eq!(
            extension(&gql, "error"),
            Some(Value::from("UNIQUE constraint failed: authors.name"))
        );
    }

    #[test]
    fn test_validation_message_names_the_action() {
        let err = CatalogError::Validation {
            action: "Saving book",
            invalid_args: "Dune".to_string(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "Saving book failed");
        assert_eq!(err.code(), "BAD_USER_INPUT");
    }

    #[test]
    fn test_authentication_has_no_invalid_args() {
        let gql = CatalogError::Authentication {
            reason: "InvalidSignature".to_string(),
        }
        .extend();
        assert_eq!(extension(&gql, "code"), Some(Value::from("UNAUTHENTICATED")));
        assert_eq!(extension(&gql, "invalidArgs"), None);
    }
}
