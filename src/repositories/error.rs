//! Repository error types

use mongodb::bson;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by [`super::GenericRepository`] operations.
///
/// Store failures pass through untouched in [`RepositoryError::Store`];
/// callers that care about the store's own signals (for example
/// `StoreError::NoDocuments` from `update_one`) match on the inner value.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Caller contract violation, detected before any store call
    #[error("Invalid argument: {description}")]
    InvalidArgument { description: String },

    /// The query ran and matched nothing
    #[error("Entity not found")]
    EntityNotFound,

    /// Identifier string is not a well-formed ObjectId
    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] bson::oid::Error),

    /// Value could not be turned into a document
    #[error("Failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    /// Document could not be decoded into the requested type
    #[error("Failed to decode document: {0}")]
    Decode(#[from] bson::de::Error),

    /// Store assigned an identifier that is not an ObjectId
    #[error("Store returned unexpected identifier: {found}")]
    UnexpectedIdentifier { found: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepositoryError {
    pub fn invalid_argument(description: impl Into<String>) -> Self {
        Self::InvalidArgument {
            description: description.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound)
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(RepositoryError::EntityNotFound.to_string(), "Entity not found");
        assert_eq!(
            RepositoryError::invalid_argument("limit out of range").to_string(),
            "Invalid argument: limit out of range"
        );
    }

    #[test]
    fn test_store_errors_are_transparent() {
        let err = RepositoryError::from(StoreError::NoDocuments);
        assert_eq!(err.to_string(), StoreError::NoDocuments.to_string());
        assert!(!err.is_not_found());
        assert!(matches!(err, RepositoryError::Store(StoreError::NoDocuments)));
    }

    #[test]
    fn test_predicates() {
        assert!(RepositoryError::EntityNotFound.is_not_found());
        assert!(!RepositoryError::EntityNotFound.is_invalid_argument());
        assert!(RepositoryError::invalid_argument("x").is_invalid_argument());
    }
}
